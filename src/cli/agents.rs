use console::style;
use crate::agents::Tier;
use crate::cli::commands::AgentsArgs;
use crate::errors::QuorumError;

pub async fn handle_agents(args: AgentsArgs) -> Result<(), QuorumError> {
    let config = super::load_config(args.config.as_deref()).await?;
    let registry = config.registry()?;
    let tiers: Vec<Tier> = match &args.tier {
        Some(t) => vec![t.parse::<Tier>()?],
        None => Tier::ALL.to_vec(),
    };

    for tier in tiers {
        let policy = config.tier_policy(tier);
        let (agents, supervisor) = registry.select_agents(tier);
        println!(
            "\n{} {}",
            style(format!("{} tier", tier)).white().bold(),
            style(format!(
                "({} tokens, {}s per call, {} analysis)",
                policy.token_budget,
                policy.call_timeout.as_secs(),
                policy.analysis_depth
            ))
            .dim(),
        );
        for agent in &agents {
            println!(
                "  {} {:<18} {:<12} {}",
                style("•").cyan(),
                agent.id,
                agent.specialty.as_str(),
                style(format!("{}/{}", agent.provider, agent.model)).dim(),
            );
        }
        println!(
            "  {} {:<18} {:<12} {}",
            style("★").yellow(),
            supervisor.id,
            "supervisor",
            style(format!("{}/{}", supervisor.provider, supervisor.model)).dim(),
        );
    }
    println!();
    Ok(())
}
