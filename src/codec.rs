//! Dump and load models and groups to plain structured values
//!
//! A dump is a `serde_json::Value`: numbers, strings, and nested maps and
//! sequences of them. The codec knows nothing about individual models; it
//! hands each value to its own `Serialize`/`Deserialize` implementation.
use crate::result::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

/// Project `x` onto a plain structured value
pub fn dump<T: Serialize + ?Sized>(x: &T) -> Result<Value> {
    Ok(serde_json::to_value(x)?)
}

/// Inverse of [`dump`]
pub fn load<T: DeserializeOwned>(dump: &Value) -> Result<T> {
    Ok(T::deserialize(dump)?)
}

/// Load hyperparameters, reporting any failure as malformed parameters for
/// `model`.
///
/// Hyperparameters must be a mapping. Serde would otherwise accept a struct
/// as a sequence in field order, which does not dump back to its input.
pub(crate) fn load_params<T: DeserializeOwned>(
    model: &'static str,
    params: &Value,
) -> Result<T> {
    if !params.is_object() {
        return Err(Error::malformed(
            model,
            format!("hyperparameters must be a mapping, found {}", params),
        ));
    }
    T::deserialize(params).map_err(|err| Error::malformed(model, err.to_string()))
}

/// Dump `x`, load the dump, and dump again, checking that nothing changed
/// along the way.
pub fn check_round_trip<T>(x: &T) -> Result<()>
where
    T: Serialize + DeserializeOwned + PartialEq + Debug,
{
    let first = dump(x)?;
    let loaded: T = load(&first)?;
    if &loaded != x {
        return Err(Error::SerializationMismatch {
            reason: format!("loaded {:?} from a dump of {:?}", loaded, x),
        });
    }
    let second = dump(&loaded)?;
    if first != second {
        return Err(Error::SerializationMismatch {
            reason: format!("dump changed from {} to {}", first, second),
        });
    }
    Ok(())
}

fn numbers_close(a: f64, b: f64, tol: f64) -> bool {
    a == b || (a - b).abs() <= tol * 1.0_f64.max(a.abs()).max(b.abs())
}

fn first_difference(path: &str, a: &Value, b: &Value, tol: f64) -> Option<String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) if numbers_close(x, y, tol) => None,
                _ => Some(format!("{}: {} != {}", path, a, b)),
            }
        }
        (Value::Array(xs), Value::Array(ys)) => {
            if xs.len() != ys.len() {
                return Some(format!(
                    "{}: length {} != {}",
                    path,
                    xs.len(),
                    ys.len()
                ));
            }
            xs.iter().zip(ys.iter()).enumerate().find_map(|(i, (x, y))| {
                first_difference(&format!("{}[{}]", path, i), x, y, tol)
            })
        }
        (Value::Object(xs), Value::Object(ys)) => {
            if let Some(key) = xs
                .keys()
                .chain(ys.keys())
                .find(|k| !(xs.contains_key(*k) && ys.contains_key(*k)))
            {
                return Some(format!("{}: key `{}` only on one side", path, key));
            }
            xs.iter().find_map(|(k, x)| {
                first_difference(&format!("{}.{}", path, k), x, &ys[k], tol)
            })
        }
        _ if a == b => None,
        _ => Some(format!("{}: {} != {}", path, a, b)),
    }
}

/// Compare two dumps structurally, allowing numbers to differ by a relative
/// tolerance `tol`.
///
/// # Example
///
/// ```
/// use conjugate::codec::check_close;
/// use serde_json::json;
///
/// let a = json!({"count": 3, "mean": 0.1 + 0.2});
/// let b = json!({"count": 3, "mean": 0.3});
///
/// assert!(check_close(&a, &b, 1e-12).is_ok());
/// assert!(check_close(&a, &json!({"count": 4, "mean": 0.3}), 1e-12).is_err());
/// ```
pub fn check_close(a: &Value, b: &Value, tol: f64) -> Result<()> {
    match first_difference("$", a, b, tol) {
        None => Ok(()),
        Some(reason) => Err(Error::SerializationMismatch { reason }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Stat {
        n: u32,
        sum: f64,
    }

    #[test]
    fn round_trip_plain_struct() {
        let stat = Stat { n: 3, sum: 0.1 + 0.2 };
        check_round_trip(&stat).unwrap();
        assert_eq!(dump(&stat).unwrap(), json!({"n": 3, "sum": 0.1 + 0.2}));
    }

    #[test]
    fn load_reports_missing_fields() {
        let res: Result<Stat> = load(&json!({"n": 3}));
        assert!(matches!(res, Err(Error::Codec(_))));
    }

    #[test]
    fn params_errors_are_malformed() {
        let res: Result<Stat> = load_params("stat", &json!({"n": -1, "sum": 0.0}));
        assert!(matches!(
            res,
            Err(Error::MalformedParameters { model: "stat", .. })
        ));
    }

    #[test]
    fn params_must_be_a_mapping() {
        let seq: Value = json!([3, 4.5]);
        assert!(load::<Stat>(&seq).is_ok());
        for params in [seq, json!(3), json!(null), json!("n")] {
            let res: Result<Stat> = load_params("stat", &params);
            assert!(res.unwrap_err().is_malformed_parameters(), "{}", params);
        }
    }

    #[test]
    fn params_from_yaml() {
        let yaml = indoc! {"
            n: 12
            sum: 4.5
        "};
        let params: Value = serde_yaml::from_str(yaml).unwrap();
        let stat: Stat = load(&params).unwrap();
        assert_eq!(stat, Stat { n: 12, sum: 4.5 });
    }

    #[test]
    fn close_reports_the_path() {
        let a = json!({"counts": [1, 2, 3]});
        let b = json!({"counts": [1, 2, 4]});
        match check_close(&a, &b, 1e-9) {
            Err(Error::SerializationMismatch { reason }) => {
                assert!(reason.starts_with("$.counts[2]"), "{}", reason)
            }
            other => panic!("expected a mismatch, got {:?}", other),
        }
    }

    #[test]
    fn close_checks_keys_and_lengths() {
        assert!(check_close(&json!({"a": 1}), &json!({"b": 1}), 1e-9).is_err());
        assert!(check_close(&json!([1, 2]), &json!([1]), 1e-9).is_err());
        assert!(check_close(&json!("x"), &json!("x"), 1e-9).is_ok());
    }
}
