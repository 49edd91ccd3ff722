use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// The canonical cache key of a query parameter.
///
/// The parameter is serialized into a JSON value, which is then written out with all object
/// fields sorted by name, recursively. This makes the key independent of struct field order,
/// map iteration order, and of the way the parameter was constructed.
///
/// The canonical text is hashed with SHA-256, and equality and hashing of [`ParamKey`] are based
/// on that digest alone.
#[derive(Debug, Clone, Eq)]
pub struct ParamKey {
    canonical: Arc<str>,
    hash: [u8; 32],
}

impl ParamKey {
    /// Canonicalizes the given parameter.
    ///
    /// Non-finite floats (`NaN` and infinities) have no JSON representation and are written as
    /// `null`. They share a key with each other and with `None`, so parameters that may contain
    /// them should be normalized by the caller.
    ///
    /// # Errors
    ///
    /// Fails if the parameter cannot be represented as JSON, for example a map with non-string
    /// keys.
    pub fn new<P: Serialize + ?Sized>(param: &P) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(param)?;
        let mut canonical = String::new();
        write_canonical(&mut canonical, &value);
        Ok(Self::from_canonical(canonical))
    }

    fn from_canonical(canonical: String) -> Self {
        let hash = Sha256::digest(canonical.as_bytes()).into();
        Self {
            canonical: canonical.into(),
            hash,
        }
    }

    /// Returns the canonical text this key was hashed from.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Returns the hex-formatted digest of this key.
    pub fn digest(&self) -> String {
        self.hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the first 8 bytes are plenty to tell keys apart in logs
        for b in &self.hash[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl PartialEq for ParamKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl std::hash::Hash for ParamKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

            out.push('{');
            for (i, (name, value)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(out, &Value::from(name.as_str()));
                out.push(':');
                write_canonical(out, value);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => write_scalar(out, scalar),
    }
}

fn write_scalar(out: &mut String, value: &Value) {
    // `Display` for scalars is compact JSON, including string escaping
    out.push_str(&value.to_string());
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Filter {
        name: &'static str,
        page: u32,
        tags: Vec<&'static str>,
    }

    #[derive(Serialize)]
    struct ReorderedFilter {
        tags: Vec<&'static str>,
        page: u32,
        name: &'static str,
    }

    #[test]
    fn test_canonical_text() {
        let key = ParamKey::new(&Filter {
            name: "users \"admin\"",
            page: 2,
            tags: vec!["a", "b"],
        })
        .unwrap();

        insta::assert_snapshot!(key.canonical(), @r###"{"name":"users \"admin\"","page":2,"tags":["a","b"]}"###);
    }

    #[test]
    fn test_field_order_is_irrelevant() {
        let first = ParamKey::new(&Filter {
            name: "users",
            page: 1,
            tags: vec!["x"],
        })
        .unwrap();
        let second = ParamKey::new(&ReorderedFilter {
            tags: vec!["x"],
            page: 1,
            name: "users",
        })
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.canonical(), second.canonical());
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_map_construction_order_is_irrelevant() {
        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        for i in 0..32 {
            forward.insert(format!("key{i}"), i);
        }
        for i in (0..32).rev() {
            backward.insert(format!("key{i}"), i);
        }
        let ordered: BTreeMap<_, _> = forward.clone().into_iter().collect();

        let forward = ParamKey::new(&forward).unwrap();
        let backward = ParamKey::new(&backward).unwrap();
        let ordered = ParamKey::new(&ordered).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, ordered);
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let value = serde_json::json!({"b": {"y": 1, "x": [{"d": 1, "c": 2}]}, "a": null});
        let first = ParamKey::new(&value).unwrap();

        assert_eq!(first.canonical(), r#"{"a":null,"b":{"x":[{"c":2,"d":1}],"y":1}}"#);
    }

    #[test]
    fn test_distinct_values() {
        let a = ParamKey::new("A").unwrap();
        let b = ParamKey::new("B").unwrap();
        let one = ParamKey::new(&1).unwrap();
        let one_str = ParamKey::new("1").unwrap();

        assert_ne!(a, b);
        assert_ne!(one, one_str);
        assert_eq!(a.digest().len(), 64);
        assert_eq!(a.to_string().len(), 16);
    }

    #[test]
    fn test_non_finite_floats_are_null() {
        let nan = ParamKey::new(&[f64::NAN]).unwrap();
        let infinity = ParamKey::new(&[f64::INFINITY]).unwrap();
        let none = ParamKey::new(&[None::<f64>]).unwrap();

        assert_eq!(nan.canonical(), "[null]");
        assert_eq!(nan, infinity);
        assert_eq!(nan, none);
        assert_ne!(nan, ParamKey::new(&[0.0]).unwrap());
    }

    #[test]
    fn test_unrepresentable_param() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys");

        assert!(ParamKey::new(&map).is_err());
    }
}
