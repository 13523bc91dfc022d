use bt_evolve::config::{
    ConfigManager, ConfigSection, GeneticParameters, GrammarConfig, RerunPolicy, SelectionMethod,
};
use bt_evolve::sbt::Grammar;
use bt_evolve::{GpError, NodeKind};

#[test]
fn test_grammar_from_toml() {
    let config = GrammarConfig::from_file("tests/data/grammar.toml").unwrap();
    assert_eq!(config.action_nodes.len(), 5);
    assert_eq!(config.up_node, ")");
    assert!(config.parallel_nodes.is_empty());
}

#[test]
fn test_grammar_from_json() {
    let config = GrammarConfig::from_file("tests/data/grammar.json").unwrap();
    let grammar = Grammar::new(config).unwrap();

    assert_eq!(grammar.kind("p("), Some(NodeKind::Parallel));
    assert_eq!(grammar.kind("picked 0?"), Some(NodeKind::Condition));
    assert_eq!(grammar.kind("pick_and_place 0!"), Some(NodeKind::AtomicSequence));
    assert_eq!(grammar.behavior_nodes(), ["pick 0!", "place at 1!", "pick_and_place 0!"]);
}

#[test]
fn test_grammar_file_must_exist() {
    assert!(matches!(
        GrammarConfig::from_file("tests/data/missing.toml"),
        Err(GpError::Config(_))
    ));
}

#[test]
fn test_app_config_from_file() {
    let manager = ConfigManager::new();
    manager.load_from_file("tests/data/app.toml").unwrap();
    let config = manager.get();

    assert_eq!(config.genetic.n_population, 16);
    assert_eq!(config.genetic.n_crossover_parents(), 4);
    assert_eq!(config.genetic.parent_selection, SelectionMethod::Rank);
    assert_eq!(config.genetic.survivor_selection, SelectionMethod::Elitism);
    assert_eq!(config.genetic.rerun_fitness, RerunPolicy::Probabilistic);
    assert_eq!(config.genetic.seed, Some(42));
    // Unset fields keep their defaults
    assert_eq!(config.genetic.checkpoint_interval, 25);
    assert_eq!(config.grammar.action_nodes, ["a0", "a1"]);
}

#[test]
fn test_environment_overrides_file() {
    std::env::set_var("BTEVOLVE__GENETIC__N_GENERATIONS", "7");
    std::env::set_var("BTEVOLVE__GENETIC__VERBOSE", "true");

    let manager = ConfigManager::new();
    let result = manager.load_layered("tests/data/app.toml");

    std::env::remove_var("BTEVOLVE__GENETIC__N_GENERATIONS");
    std::env::remove_var("BTEVOLVE__GENETIC__VERBOSE");
    result.unwrap();

    let config = manager.get();
    assert_eq!(config.genetic.n_generations, 7);
    assert!(config.genetic.verbose);
    assert_eq!(config.genetic.n_population, 16);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("saved.toml");

    let manager = ConfigManager::new();
    manager.load_from_file("tests/data/app.toml").unwrap();
    manager.save_to_file(&path).unwrap();

    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&path).unwrap();
    assert_eq!(reloaded.get(), manager.get());
}

#[test]
fn test_update_keeps_valid_config() {
    let manager = ConfigManager::new();
    manager.load_from_file("tests/data/app.toml").unwrap();
    manager
        .update(|config| config.genetic.n_population = 24)
        .unwrap();
    assert_eq!(manager.get().genetic.n_population, 24);

    // Odd number of crossover parents
    let result = manager.update(|config| config.genetic.f_crossover = 0.05);
    assert!(matches!(result, Err(GpError::Configuration(_))));
    assert_eq!(manager.get().genetic.f_crossover, 0.25);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[genetic]\nmutation_p_add = 0.8\nmutation_p_delete = 0.5\n").unwrap();

    let manager = ConfigManager::new();
    assert!(manager.load_from_file(&path).is_err());
    assert_eq!(manager.get().genetic.mutation_p_add, 0.4);
}

#[test]
fn test_layered_sections_default_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grammar_only.toml");
    std::fs::write(
        &path,
        "[grammar]\ncondition_nodes = [\"c0\"]\naction_nodes = [\"a0\"]\n",
    )
    .unwrap();

    let manager = ConfigManager::new();
    manager.load_layered(&path).unwrap();
    let config = manager.get();

    assert_eq!(GeneticParameters::section_name(), "genetic");
    assert_eq!(GrammarConfig::section_name(), "grammar");
    let defaults = GeneticParameters::default();
    assert_eq!(config.genetic.n_population, defaults.n_population);
    assert_eq!(config.genetic.mutation_p_add, defaults.mutation_p_add);
    assert_eq!(config.genetic.log_name, defaults.log_name);
    assert_eq!(config.grammar.action_nodes, ["a0"]);
    assert_eq!(config.grammar.sequence_nodes, ["s("]);
}
