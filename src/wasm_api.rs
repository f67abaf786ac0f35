use crate::{GameConfig, GameState, Hand, Move, PlayerId, Table, Tile, rules, solver};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Envelope returned by every JSON-producing call
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn respond<T: Serialize>(result: Result<T, String>) -> String {
    let response = match result {
        Ok(data) => ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        },
        Err(error) => ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        },
    };
    serde_json::to_string(&response)
        .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"Serialization error: {}"}}"#, e))
}

fn parse_tile_list(json: &str) -> Result<Vec<Tile>, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid tiles JSON: {}", e))
}

/// A game session held on the JS side.
///
/// Moves and results cross the boundary as JSON; tiles use the short
/// notation ("r7", "k13", "j").
#[wasm_bindgen]
pub struct RummikubGame {
    state: GameState,
}

#[wasm_bindgen]
impl RummikubGame {
    /// Seat players from a JSON array of names.
    ///
    /// `config_json` may be empty for the defaults, or an object with any of
    /// `hand_size`, `opening_threshold`, `seed`.
    #[wasm_bindgen(constructor)]
    pub fn new(names_json: &str, config_json: &str) -> Result<RummikubGame, String> {
        let names: Vec<String> =
            serde_json::from_str(names_json).map_err(|e| format!("Invalid names JSON: {}", e))?;
        let config = if config_json.trim().is_empty() {
            GameConfig::default()
        } else {
            serde_json::from_str(config_json).map_err(|e| format!("Invalid config JSON: {}", e))?
        };
        let state = GameState::new(names, config).map_err(|e| e.to_string())?;
        Ok(RummikubGame { state })
    }

    /// Shuffle and deal. Returns the status envelope.
    pub fn start(&mut self) -> String {
        respond(
            self.state
                .start()
                .map(|()| self.state.status())
                .map_err(|e| e.to_string()),
        )
    }

    /// Submit a move such as `{"kind":"play_new_set","player":0,"tiles":["r9","r10","r11"]}`.
    pub fn submit_move(&mut self, move_json: &str) -> String {
        let result = serde_json::from_str::<Move>(move_json)
            .map_err(|e| format!("Invalid move JSON: {}", e))
            .and_then(|mv| self.state.submit(mv).map_err(|e| e.to_string()));
        respond(result)
    }

    pub fn status(&self) -> String {
        respond(Ok::<_, String>(self.state.status()))
    }

    pub fn table(&self) -> String {
        respond(Ok::<_, String>(self.state.table()))
    }

    /// Tiles held by one player, in sorted order.
    pub fn hand(&self, player: usize) -> String {
        let result = self
            .state
            .player(PlayerId(player))
            .map(|p| p.hand().tiles())
            .ok_or_else(|| format!("unknown player {}", player));
        respond(result)
    }

    pub fn scores(&self) -> String {
        respond(self.state.scores().map_err(|e| e.to_string()))
    }

    /// Search for a table layout absorbing the given hand tiles.
    pub fn suggest_arrangement(&self, player: usize, tiles_json: &str) -> String {
        let result = parse_tile_list(tiles_json).and_then(|tiles| {
            self.state
                .suggest_arrangement(PlayerId(player), &tiles)
                .map_err(|e| e.to_string())
        });
        respond(result)
    }
}

/// Check a single set, reporting whether it is a group or a run
///
/// # Arguments
/// * `tiles_json` - JSON array of tile strings (e.g., ["r1", "j", "r3"])
#[wasm_bindgen]
pub fn validate_set(tiles_json: &str) -> String {
    let result = parse_tile_list(tiles_json)
        .and_then(|tiles| rules::classify(&tiles).map_err(|e| e.to_string()));
    respond(result)
}

/// Stateless layout search over an arbitrary table
///
/// # Arguments
/// * `table_json` - JSON array of sets (e.g., [["r1", "r2", "r3"], ["b5", "k5", "o5"]])
/// * `tiles_json` - JSON array of tiles to place
#[wasm_bindgen]
pub fn rearrange_table(table_json: &str, tiles_json: &str) -> String {
    let result = serde_json::from_str::<Table>(table_json)
        .map_err(|e| format!("Invalid table JSON: {}", e))
        .and_then(|table| Ok((table, parse_tile_list(tiles_json)?)))
        .and_then(|(table, tiles)| {
            let mut pool = table.counts();
            pool.absorb(&Hand::from_tiles(tiles.iter().copied()));
            if !pool.within_standard_pool() {
                return Err("More copies of a tile than a standard set holds".to_string());
            }
            solver::rearrange(&table, &tiles)
                .map(|found| found.table)
                .ok_or_else(|| "No legal layout absorbs those tiles".to_string())
        });
    respond(result)
}

/// Get the git commit hash that this WASM module was built from
///
/// Returns the first 8 characters of the commit hash, or "unknown" if not available
#[wasm_bindgen]
pub fn get_build_commit() -> String {
    env!("BUILD_COMMIT").to_string()
}
