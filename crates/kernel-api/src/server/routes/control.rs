#[derive(Debug, Serialize)]
struct CreateRunResponse {
    schema_version: String,
    run_id: String,
    status: WorldStatus,
    replaced_existing_run: bool,
}

async fn create_run(
    State(state): State<AppState>,
    Json(config): Json<RunConfig>,
) -> Result<Json<CreateRunResponse>, HttpApiError> {
    let engine = EngineApi::from_config(config)
        .map_err(|err| HttpApiError::invalid_config(err.to_string()))?;
    let status = engine.status();

    let replaced_existing_run = {
        let mut inner = state.inner.lock().await;
        inner.engine.replace(engine).is_some()
    };
    if replaced_existing_run {
        warn!(run_id = %status.run_id, "existing run replaced");
    }

    Ok(Json(CreateRunResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id: status.run_id.clone(),
        status,
        replaced_existing_run,
    }))
}

async fn get_status(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WorldStatus>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    Ok(Json(engine.status()))
}

#[derive(Debug, Serialize)]
struct RunControlResponse {
    schema_version: String,
    run_id: String,
    status: WorldStatus,
    committed: u64,
}

#[derive(Debug, Deserialize, Default)]
struct StepRequest {
    steps: Option<u64>,
}

async fn step_run(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> Result<Json<RunControlResponse>, HttpApiError> {
    let steps = request.steps.unwrap_or(1);
    if steps == 0 {
        return Err(HttpApiError::invalid_query(
            "steps must be greater than zero",
            None,
        ));
    }

    let mut inner = state.inner.lock().await;
    let engine = require_run_mut(&mut inner, &run_id)?;
    let (status, committed) = engine.step(steps).map_err(HttpApiError::halted)?;

    Ok(Json(RunControlResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id: status.run_id.clone(),
        status,
        committed,
    }))
}

#[derive(Debug, Deserialize)]
struct RunToTurnRequest {
    target_turn: u64,
}

async fn run_to_turn(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RunToTurnRequest>,
) -> Result<Json<RunControlResponse>, HttpApiError> {
    let mut inner = state.inner.lock().await;
    let engine = require_run_mut(&mut inner, &run_id)?;
    let current_turn = engine.status().current_turn;
    if request.target_turn < current_turn {
        return Err(HttpApiError::invalid_query(
            "target_turn is behind the current turn",
            Some(format!(
                "target_turn={} current_turn={current_turn}",
                request.target_turn
            )),
        ));
    }

    let (status, committed) = engine
        .run_to_turn(request.target_turn)
        .map_err(HttpApiError::halted)?;

    Ok(Json(RunControlResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id: status.run_id.clone(),
        status,
        committed,
    }))
}
