use rummikub_engine::{GameConfig, GameState, MoveOutcome, solver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const PLAYERS: [&str; 4] = ["Alice", "Bob", "Carol", "Dave"];

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(commit = env!("BUILD_COMMIT"), "Rummikub engine");

    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(42);
    let config = GameConfig {
        seed: Some(seed),
        ..GameConfig::default()
    };

    let mut game = match GameState::start_new(PLAYERS, config) {
        Ok(game) => game,
        Err(e) => {
            warn!(error = %e, "could not start game");
            return;
        }
    };

    // Opening hands: which players could lay their whole hand right now.
    for player in game.players() {
        let sets = solver::partition(player.hand()).map(|melds| melds.len());
        info!(player = player.name(), tiles = player.tile_count(), ?sets, "dealt");
    }

    // Draw-only play until the pile runs out.
    loop {
        let current = game.current_player().id();
        let Some(mv) = game.valid_moves(current).into_iter().next() else {
            info!(turn = game.turn(), "draw pile exhausted");
            break;
        };
        match game.submit(mv) {
            Ok(MoveOutcome::Continue { .. }) => {}
            Ok(MoveOutcome::Won { winner }) => {
                info!(%winner, "game won");
                break;
            }
            Err(e) => {
                warn!(error = %e, "move rejected");
                break;
            }
        }
    }

    match serde_json::to_string_pretty(&game.status()) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "could not serialise status"),
    }
}
