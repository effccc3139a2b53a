#[derive(Debug, Deserialize, Default)]
struct PaginationQuery {
    cursor: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct TurnPage {
    schema_version: String,
    run_id: String,
    cursor: usize,
    next_cursor: Option<usize>,
    turns: Vec<TurnRecord>,
}

async fn get_turns(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<TurnPage>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    let turns = engine.turns();
    let window = PageWindow::over(turns.len(), query.cursor, query.page_size)?;

    Ok(Json(TurnPage {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        cursor: window.start,
        next_cursor: window.next_cursor,
        turns: turns[window.start..window.end].to_vec(),
    }))
}

async fn get_turn(
    Path((run_id, turn)): Path<(String, u64)>,
    State(state): State<AppState>,
) -> Result<Json<TurnRecord>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    engine
        .turn(turn)
        .cloned()
        .map(Json)
        .ok_or_else(|| HttpApiError::turn_out_of_range(turn, engine.status().current_turn))
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    schema_version: String,
    run_id: String,
    turn: u64,
    records: Vec<Accountability>,
}

async fn get_history(
    Path((run_id, turn)): Path<(String, u64)>,
    State(state): State<AppState>,
) -> Result<Json<HistoryResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    let current_turn = engine.status().current_turn;
    if turn >= current_turn {
        return Err(HttpApiError::turn_out_of_range(turn, current_turn));
    }

    Ok(Json(HistoryResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        turn,
        records: engine.history(turn).to_vec(),
    }))
}

#[derive(Debug, Serialize)]
struct OutcomeResponse {
    schema_version: String,
    run_id: String,
    outcome: Option<CycleOutcome>,
}

async fn get_last_outcome(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OutcomeResponse>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;

    Ok(Json(OutcomeResponse {
        schema_version: SCHEMA_VERSION_V1.to_string(),
        run_id,
        outcome: engine.last_outcome().cloned(),
    }))
}

async fn get_roles(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RolesSummary>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    Ok(Json(engine.roles()))
}

async fn get_rules(
    Path(run_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RulesSummary>, HttpApiError> {
    let inner = state.inner.lock().await;
    let engine = require_run(&inner, &run_id)?;
    Ok(Json(engine.rules()))
}
