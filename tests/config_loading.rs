use clantune::config::{AncestryConfig, ConfigManager, MutationConfig};
use clantune::genetics::{AlleleKind, AlleleParams, Bounds, Domain, Genome};
use clantune::strategies::SamplingMode;
use clantune::ClanTuneError;
use std::path::PathBuf;

fn write_temp(extension: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "clantune-test-{}.{}",
        uuid::Uuid::new_v4(),
        extension
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

fn population() -> Vec<Genome> {
    (0..5)
        .map(|rank| {
            Genome::new()
                .add_hyperparameter(
                    "lr",
                    1e-3 * (rank + 1) as f64,
                    AlleleKind::LogFloat,
                    AlleleParams::new().domain(Domain::Continuous(Bounds::new(1e-5, 1e-1))),
                )
                .unwrap()
                .set_fitness(rank as f64)
        })
        .collect()
}

#[test]
fn test_toml_pipeline_reproduces_deterministically() {
    let path = write_temp(
        "toml",
        r#"
        seed = 2024

        [ancestry]
        method = "top_n"
        n = 3
        [ancestry.inner]
        method = "boltzmann"
        temperature = 2.0
        num_parents = 5

        [crossbreeding]
        method = "stochastic"

        [mutation]
        method = "differential_evolution"
        F = 0.6
        sampling_mode = "uniform"
        "#,
    );
    let manager = ConfigManager::new();
    let loaded = manager.load_from_file(&path);
    std::fs::remove_file(&path).unwrap();
    loaded.unwrap();

    let config = manager.get().unwrap();
    assert_eq!(config.seed, Some(2024));
    assert!(matches!(config.ancestry, AncestryConfig::TopN { n: 3, .. }));

    let population = population();
    let orchestrator = config.build_orchestrator().unwrap();
    let first = orchestrator
        .reproduce_all(&population, &mut config.build_rng())
        .unwrap();
    let second = orchestrator
        .reproduce_all(&population, &mut config.build_rng())
        .unwrap();

    assert_eq!(first.len(), population.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.alleles(), b.alleles());
        assert_eq!(a.ancestry().unwrap().live_count(), 3);
    }
}

#[test]
fn test_json_config_is_accepted() {
    let path = write_temp(
        "json",
        r#"{
            "ancestry": { "method": "elite_breeds", "thrive": 1, "die": 1 },
            "mutation": { "method": "differential_evolution", "f": 1.1, "sampling_mode": "weighted" }
        }"#,
    );
    let manager = ConfigManager::new();
    let loaded = manager.load_from_file(&path);
    std::fs::remove_file(&path).unwrap();
    loaded.unwrap();

    let config = manager.get().unwrap();
    assert_eq!(config.ancestry, AncestryConfig::EliteBreeds { thrive: 1, die: 1 });
    assert_eq!(
        config.mutation,
        MutationConfig::DifferentialEvolution {
            f: 1.1,
            sampling_mode: SamplingMode::Weighted,
            use_metalearning: false,
        }
    );
    assert!(config.seed.is_none());
}

#[test]
fn test_unknown_method_is_a_configuration_error() {
    let path = write_temp("toml", "[crossbreeding]\nmethod = \"blend_alpha\"\n");
    let result = ConfigManager::new().load_from_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(result, Err(ClanTuneError::Configuration(_))));
}
