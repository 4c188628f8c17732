//! Headless demo: a handful of villagers deciding in a loop.
//!
//! ```bash
//! cargo run -p npcmind-engine --bin npcmind-demo              # rules-only, fast cooldowns
//! cargo run -p npcmind-engine --bin npcmind-demo npcmind.toml # your tiers
//! ```
//!
//! `RUST_LOG` overrides the configured log level.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use npcmind_core::{AgentId, Needs, Position, TraitVector};
use npcmind_engine::{AgentProfile, DecisionContext, Engine, EngineConfig, logger, telemetry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const VILLAGERS: [&str; 5] = ["Ada", "Bram", "Cora", "Dunstan", "Elin"];
const TICKS: usize = 40;
const SIGHT: f32 = 12.0;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        None => demo_config(),
    };
    telemetry::init_tracing(&config.general);

    let logger = logger::from_config(&config.interaction_log).context("creating interaction logger")?;
    let engine = Arc::new(Engine::new(config, logger).context("starting engine")?);
    let mut rng = StdRng::seed_from_u64(7);

    for name in VILLAGERS {
        let profile = AgentProfile::new(name, TraitVector::random(&mut rng))
            .with_needs(Needs::new(
                rng.gen_range(0.2..1.0),
                rng.gen_range(0.2..1.0),
                rng.gen_range(0.2..1.0),
                rng.gen_range(0.2..1.0),
            ))
            .at(Position::new(rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0)));
        engine.register_agent(profile);
    }

    for tick in 0..TICKS {
        let now = Utc::now();
        let ids = engine.agent_ids();
        let positions: Vec<(AgentId, Position)> = ids
            .iter()
            .filter_map(|id| engine.agent(id).map(|h| (id.clone(), h.lock().position)))
            .collect();

        let batch = positions
            .iter()
            .map(|(id, pos)| {
                let mut ctx = DecisionContext::new(now).with_situation("in the village");
                for (other, other_pos) in &positions {
                    let d = pos.distance(other_pos);
                    if other != id && d <= SIGHT {
                        ctx = ctx.with_nearby(other.clone(), d);
                    }
                }
                if tick % 10 < 3 {
                    ctx = ctx.with_event("market day");
                }
                (id.clone(), ctx)
            })
            .collect();

        for task in engine.spawn_due(batch) {
            let decision = task.await.context("decision task panicked")?;
            println!(
                "[{tick:02}] {:<8} {:<12} {:<16} via {}{}",
                decision.agent,
                decision.response.action,
                decision.response.target,
                decision.tier,
                if decision.cached { " (cached)" } else { "" }
            );
            engine.report_outcome(&decision.agent, rng.gen_range(0.3..1.0));
        }

        for (id, _) in &positions {
            if let Some(handle) = engine.agent(id) {
                let mut state = handle.lock();
                let n = state.needs;
                state.needs = Needs::new(n.hunger - 0.03, n.sleep - 0.02, n.social - 0.04, n.fun - 0.03);
            }
        }
        let group: Vec<AgentId> = positions.iter().map(|(id, _)| id.clone()).collect();
        engine.contagion_tick(&group, now);

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let stats = engine.shutdown()?;
    println!("\n{}", engine.counters().to_prometheus());
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn demo_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.general.seed = Some(42);
    config.decision.cooldown_min_secs = 0.1;
    config.decision.cooldown_max_secs = 0.3;
    config
}
