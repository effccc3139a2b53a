/// Shared server state: at most one active run.
#[derive(Clone, Default)]
pub struct AppState {
    inner: Arc<Mutex<ServerInner>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: EngineApi) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerInner {
                engine: Some(engine),
            })),
        }
    }
}

#[derive(Default)]
struct ServerInner {
    engine: Option<EngineApi>,
}

fn require_run<'a>(inner: &'a ServerInner, run_id: &str) -> Result<&'a EngineApi, HttpApiError> {
    let Some(engine) = inner.engine.as_ref() else {
        return Err(HttpApiError::run_not_found(run_id, None));
    };

    if engine.run_id() != run_id {
        return Err(HttpApiError::run_not_found(run_id, Some(engine.run_id())));
    }

    Ok(engine)
}

fn require_run_mut<'a>(
    inner: &'a mut ServerInner,
    run_id: &str,
) -> Result<&'a mut EngineApi, HttpApiError> {
    let active_run_id = inner
        .engine
        .as_ref()
        .map(|engine| engine.run_id().to_string());
    let Some(engine) = inner.engine.as_mut() else {
        return Err(HttpApiError::run_not_found(run_id, None));
    };

    if engine.run_id() != run_id {
        return Err(HttpApiError::run_not_found(
            run_id,
            active_run_id.as_deref(),
        ));
    }

    Ok(engine)
}
