use bt_evolve::data::FitnessCache;
use bt_evolve::GpError;

fn key(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_load_reproduces_written_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hash_log.txt");

    let mut cache = FitnessCache::new(10);
    cache.insert(&key(&["1"]), 1.0);
    cache.insert(&key(&["2"]), 2.0);
    cache.insert(&key(&["3"]), 3.0);
    cache.insert(&key(&["4"]), 4.0);
    cache.insert(&key(&["4"]), 5.0);
    cache.insert(&key(&["s(", "c0", "a0", ")"]), -0.125);
    cache.write(&path).unwrap();

    let mut loaded = FitnessCache::new(10);
    loaded.load(&path).unwrap();

    assert_eq!(loaded, cache);
    assert_eq!(loaded.n_values(), 6);
    assert_eq!(loaded.find(&key(&["4"])), Some(&[4.0, 5.0][..]));
}

#[test]
fn test_multiple_values_per_key() {
    let mut cache = FitnessCache::new(10);
    for value in [1.0, 2.0, 3.0] {
        cache.insert(&key(&["a"]), value);
    }
    assert_eq!(cache.find(&key(&["a"])), Some(&[1.0, 2.0, 3.0][..]));
    assert_eq!(cache.mean(&key(&["a"])), Some(2.0));
}

#[test]
fn test_load_tolerates_wrong_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hash_log.txt");
    std::fs::write(
        &path,
        "key: [\"s(\", \"a0\", \")\"], value: [1.0, 3.0], count: 5\n\nkey: [\"a1\"], value: [2.5], count: 1\n",
    )
    .unwrap();

    let mut cache = FitnessCache::new(4);
    cache.load(&path).unwrap();
    assert_eq!(cache.find(&key(&["s(", "a0", ")"])), Some(&[1.0, 3.0][..]));
    assert_eq!(cache.mean(&key(&["a1"])), Some(2.5));
    assert_eq!(cache.n_values(), 3);
}

#[test]
fn test_load_reports_corrupt_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hash_log.txt");
    std::fs::write(&path, "key: [\"a0\"], value: [oops], count: 1\n").unwrap();

    let mut cache = FitnessCache::new(4);
    assert!(matches!(cache.load(&path), Err(GpError::Persistence(_))));
}

#[test]
fn test_load_missing_file() {
    let mut cache = FitnessCache::new(4);
    assert!(matches!(
        cache.load("does/not/exist.txt"),
        Err(GpError::Io(_))
    ));
}
