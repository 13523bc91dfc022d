use crate::error::{GpError, Result};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
struct CacheEntry {
    key: Vec<String>,
    values: Vec<f64>,
}

/// Fitness values recorded per genome.
///
/// A fixed number of buckets, each holding a chain of entries whose keys hash
/// to it. Nothing is ever evicted; several values can be recorded under the
/// same genome when a noisy environment is sampled again.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessCache {
    buckets: Vec<Vec<CacheEntry>>,
    n_values: usize,
}

impl FitnessCache {
    pub fn new(size: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); size.max(1)],
            n_values: 0,
        }
    }

    /// Number of buckets
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    /// Number of distinct genomes stored
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Total number of values recorded, i.e. the number of evaluations so far
    pub fn n_values(&self) -> usize {
        self.n_values
    }

    fn bucket_index(&self, key: &[String]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.concat().hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }

    pub fn insert(&mut self, key: &[String], value: f64) {
        let index = self.bucket_index(key);
        let chain = &mut self.buckets[index];
        match chain.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.values.push(value),
            None => chain.push(CacheEntry {
                key: key.to_vec(),
                values: vec![value],
            }),
        }
        self.n_values += 1;
    }

    /// All values recorded for `key`, oldest first
    pub fn find(&self, key: &[String]) -> Option<&[f64]> {
        let index = self.bucket_index(key);
        self.buckets[index]
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.values.as_slice())
    }

    /// Mean of the values recorded for `key`
    pub fn mean(&self, key: &[String]) -> Option<f64> {
        self.find(key).map(mean)
    }

    /// Write every entry, one line each:
    /// `key: ["s(", "a0", ")"], value: [1.0, 2.0], count: 2`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);

        for entry in self.buckets.iter().flatten() {
            writeln!(
                writer,
                "key: {}, value: {}, count: {}",
                serde_json::to_string(&entry.key)?,
                format_values(&entry.values),
                entry.values.len()
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Insert every entry of a file written by [`FitnessCache::write`]
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;

        for (line_number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, values, count) = parse_line(line).map_err(|e| {
                GpError::Persistence(format!("Cache line {}: {}", line_number + 1, e))
            })?;

            if count != Some(values.len()) {
                log::warn!(
                    "Cache line {} reports count {:?} for {} values, using the values",
                    line_number + 1,
                    count,
                    values.len()
                );
            }
            for value in values {
                self.insert(&key, value);
            }
        }
        Ok(())
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn format_values(values: &[f64]) -> String {
    let mut out = String::from("[");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        // Debug keeps a decimal point and spells out NaN and infinities
        let _ = write!(out, "{:?}", value);
    }
    out.push(']');
    out
}

fn parse_line(line: &str) -> std::result::Result<(Vec<String>, Vec<f64>, Option<usize>), String> {
    let rest = line
        .strip_prefix("key: ")
        .ok_or_else(|| "missing 'key: ' prefix".to_string())?;
    let (rest, count) = match rest.rsplit_once(", count: ") {
        Some((rest, count)) => (rest, count.trim().parse::<usize>().ok()),
        None => (rest, None),
    };
    let (key, values) = rest
        .rsplit_once(", value: ")
        .ok_or_else(|| "missing ', value: ' separator".to_string())?;

    let key: Vec<String> = serde_json::from_str(key).map_err(|e| format!("bad key: {}", e))?;

    let inner = values
        .trim()
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or_else(|| format!("bad value list '{}'", values))?;
    let values = inner
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<f64>().map_err(|e| format!("bad value '{}': {}", v, e)))
        .collect::<std::result::Result<Vec<f64>, String>>()?;

    if values.is_empty() {
        return Err("entry without values".to_string());
    }
    Ok((key, values, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_multiple_entries_per_key() {
        let mut cache = FitnessCache::new(10);
        for v in [1.0, 2.0, 3.0] {
            cache.insert(&key(&["a"]), v);
        }
        for v in [4.0, 5.0, 6.0] {
            cache.insert(&key(&["b"]), v);
        }

        assert_eq!(cache.find(&key(&["a"])), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(cache.find(&key(&["b"])), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(cache.mean(&key(&["b"])), Some(5.0));
        assert_eq!(cache.find(&key(&["c"])), None);
        assert_eq!(cache.n_values(), 6);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_collisions_keep_keys_apart() {
        // A single bucket forces every key into the same chain
        let mut cache = FitnessCache::new(1);
        cache.insert(&key(&["s(", "a0", ")"]), 1.0);
        cache.insert(&key(&["f(", "a0", ")"]), 2.0);
        cache.insert(&key(&["s(", "a0", ")"]), 3.0);

        assert_eq!(cache.find(&key(&["s(", "a0", ")"])), Some(&[1.0, 3.0][..]));
        assert_eq!(cache.find(&key(&["f(", "a0", ")"])), Some(&[2.0][..]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_parse_line_ignores_wrong_count() {
        let (k, values, count) =
            parse_line(r#"key: ["s(", "a0", ")"], value: [1.5, -2.0], count: 7"#).unwrap();
        assert_eq!(k, key(&["s(", "a0", ")"]));
        assert_eq!(values, vec![1.5, -2.0]);
        assert_eq!(count, Some(7));
    }

    #[test]
    fn test_parse_line_special_values() {
        let line = format!(
            "key: [\"a0\"], value: {}, count: 3",
            format_values(&[f64::NEG_INFINITY, 0.25, f64::INFINITY])
        );
        let (_, values, _) = parse_line(&line).unwrap();
        assert_eq!(values, vec![f64::NEG_INFINITY, 0.25, f64::INFINITY]);
    }

    #[test]
    fn test_parse_line_rejects_garbage() {
        assert!(parse_line("value: [1.0]").is_err());
        assert!(parse_line("key: [\"a0\"], value: [], count: 0").is_err());
        assert!(parse_line("key: a0, value: [1.0], count: 1").is_err());
    }
}
