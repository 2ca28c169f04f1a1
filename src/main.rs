use anyhow::{bail, Context};
use clantune::config::ConfigManager;
use clantune::genetics::Genome;
use log::info;

const USAGE: &str = "usage: clantune <config.toml> <population.json> [self-index]";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config_path, population_path) = match args.as_slice() {
        [config, population] | [config, population, _] => (config, population),
        _ => bail!(USAGE),
    };
    let self_index = match args.get(2) {
        Some(raw) => Some(
            raw.parse::<usize>()
                .with_context(|| format!("invalid self-index '{}'", raw))?,
        ),
        None => None,
    };

    let manager = ConfigManager::new();
    manager
        .load_from_file(config_path)
        .with_context(|| format!("loading {}", config_path))?;
    let config = manager.get()?;

    let text = std::fs::read_to_string(population_path)
        .with_context(|| format!("reading {}", population_path))?;
    let population: Vec<Genome> = serde_json::from_str(&text)
        .with_context(|| format!("parsing population from {}", population_path))?;
    info!("Loaded {} genomes from {}", population.len(), population_path);

    let orchestrator = config.build_orchestrator()?;
    let mut rng = config.build_rng();

    let offspring = match self_index {
        Some(index) => {
            let Some(me) = population.get(index) else {
                bail!("self-index {} is out of range for {} genomes", index, population.len());
            };
            vec![orchestrator.reproduce(me, &population, &mut rng)?]
        }
        None => orchestrator.reproduce_all(&population, &mut rng)?,
    };

    println!("{}", serde_json::to_string_pretty(&offspring)?);
    Ok(())
}
