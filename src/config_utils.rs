use std::path::Path;
use std::path::PathBuf;

use yaml_rust::Yaml;

use super::error::{PathChoiceError, Result};


pub fn str_to_absolute_path(path_str: &str, default_base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        return path;
    } else {
        return [default_base_dir, Path::new(&path)].iter().collect();
    }
}

fn is_missing(value: &Yaml) -> bool {
    return value.is_badvalue() || value.is_null();
}

fn bad_value(key: &str, value: &Yaml) -> PathChoiceError {
    return PathChoiceError::Config(format!("invalid value for {}: {:?}", key, value));
}

/// Integers are accepted as floats.
pub fn yaml_as_f64(value: &Yaml) -> Option<f64> {
    return value.as_f64().or_else(|| value.as_i64().map(|ii| ii as f64));
}

pub fn get_f64(cfg: &Yaml, key: &str, default: f64) -> Result<f64> {
    let value = &cfg[key];
    if is_missing(value) {
        return Ok(default);
    }
    return yaml_as_f64(value).ok_or_else(|| bad_value(key, value));
}

pub fn get_opt_f64(cfg: &Yaml, key: &str) -> Result<Option<f64>> {
    let value = &cfg[key];
    if is_missing(value) {
        return Ok(None);
    }
    return yaml_as_f64(value).map(Some).ok_or_else(|| bad_value(key, value));
}

pub fn get_usize(cfg: &Yaml, key: &str, default: usize) -> Result<usize> {
    let value = &cfg[key];
    if is_missing(value) {
        return Ok(default);
    }
    match value.as_i64() {
        Some(ii) if ii >= 0 => Ok(ii as usize),
        _ => Err(bad_value(key, value)),
    }
}

pub fn get_bool(cfg: &Yaml, key: &str, default: bool) -> Result<bool> {
    let value = &cfg[key];
    if is_missing(value) {
        return Ok(default);
    }
    return value.as_bool().ok_or_else(|| bad_value(key, value));
}

pub fn get_opt_str<'a>(cfg: &'a Yaml, key: &str) -> Result<Option<&'a str>> {
    let value = &cfg[key];
    if is_missing(value) {
        return Ok(None);
    }
    return value.as_str().map(Some).ok_or_else(|| bad_value(key, value));
}

pub fn get_str<'a>(cfg: &'a Yaml, key: &str) -> Result<&'a str> {
    return get_opt_str(cfg, key)?
        .ok_or_else(|| PathChoiceError::Config(format!("missing required key {}", key)));
}

/// The elements of a list value, or `None` if the key is absent.
pub fn get_opt_list<'a>(cfg: &'a Yaml, key: &str) -> Result<Option<&'a Vec<Yaml>>> {
    let value = &cfg[key];
    if is_missing(value) {
        return Ok(None);
    }
    return value.as_vec().map(Some).ok_or_else(|| bad_value(key, value));
}

pub fn get_opt_zone_list(cfg: &Yaml, key: &str) -> Result<Option<Vec<u32>>> {
    let list = match get_opt_list(cfg, key)? {
        Some(list) => list,
        None => return Ok(None),
    };
    let mut zones = Vec::with_capacity(list.len());
    for value in list {
        match value.as_i64() {
            Some(zone) if zone > 0 && zone <= u32::MAX as i64 => zones.push(zone as u32),
            _ => return Err(bad_value(key, value)),
        }
    }
    return Ok(Some(zones));
}

pub fn get_opt_f64_list(cfg: &Yaml, key: &str) -> Result<Option<Vec<f64>>> {
    let list = match get_opt_list(cfg, key)? {
        Some(list) => list,
        None => return Ok(None),
    };
    let mut values = Vec::with_capacity(list.len());
    for value in list {
        values.push(yaml_as_f64(value).ok_or_else(|| bad_value(key, value))?);
    }
    return Ok(Some(values));
}

pub fn get_opt_usize_list(cfg: &Yaml, key: &str) -> Result<Option<Vec<usize>>> {
    let list = match get_opt_list(cfg, key)? {
        Some(list) => list,
        None => return Ok(None),
    };
    let mut values = Vec::with_capacity(list.len());
    for value in list {
        match value.as_i64() {
            Some(ii) if ii >= 0 => values.push(ii as usize),
            _ => return Err(bad_value(key, value)),
        }
    }
    return Ok(Some(values));
}

pub fn get_opt_str_list(cfg: &Yaml, key: &str) -> Result<Option<Vec<String>>> {
    let list = match get_opt_list(cfg, key)? {
        Some(list) => list,
        None => return Ok(None),
    };
    let mut strs = Vec::with_capacity(list.len());
    for value in list {
        match value.as_str() {
            Some(ss) => strs.push(String::from(ss)),
            None => return Err(bad_value(key, value)),
        }
    }
    return Ok(Some(strs));
}
