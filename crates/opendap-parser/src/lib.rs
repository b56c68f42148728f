//! Parser for OPeNDAP ASCII grid responses.
//!
//! The fallback access method requests a `.ascii` constraint expression
//! against the yearly dataset, e.g. `sst.ascii?sst[205][472:528][480:540]`,
//! and the server answers with a text document: the DDS prologue, a dashed
//! separator, the data block with one `[t][row], v, v, ...` line per
//! latitude row, and the coordinate map vectors.
//!
//! Values are returned exactly as served (raw packed integers for this
//! dataset); applying scale/offset/fill is the caller's job so both access
//! methods share a single unpacking step.

use thiserror::Error;
use tracing::trace;

/// Result type for OPeNDAP parsing.
pub type DapResult<T> = Result<T, DapParseError>;

/// Error types for OPeNDAP ASCII parsing.
#[derive(Debug, Error)]
pub enum DapParseError {
    #[error("Response has no header/data separator line")]
    MissingSeparator,

    #[error("Response has no data block for variable '{0}'")]
    MissingDataBlock(String),

    #[error("Response has no coordinate map for '{0}'")]
    MissingMap(String),

    #[error("Malformed dimension header: {0}")]
    InvalidDimensions(String),

    #[error("Malformed number '{0}'")]
    InvalidNumber(String),

    #[error("Data shape mismatch: header says {expected} values, found {found}")]
    ShapeMismatch { expected: usize, found: usize },
}

/// A parsed grid response: raw values plus coordinate maps.
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    /// Row-major raw values (latitude outer), unscaled.
    pub values: Vec<f64>,
    /// Latitude map, as served.
    pub lat: Vec<f64>,
    /// Longitude map, as served.
    pub lon: Vec<f64>,
    pub n_lat: usize,
    pub n_lon: usize,
}

/// Parse an ASCII grid response for `var` (e.g. `"sst"`).
pub fn parse_grid_response(text: &str, var: &str) -> DapResult<AsciiGrid> {
    let body = split_off_dds(text)?;

    let mut values: Option<(Vec<f64>, usize, usize)> = None;
    let mut lat: Option<Vec<f64>> = None;
    let mut lon: Option<Vec<f64>> = None;

    for block in blocks(body) {
        let header = block[0].trim();
        if let Some(dims) = block_dims(header, var) {
            values = Some(parse_data_block(&block[1..], &dims)?);
        } else if block_is_map(header, "lat") {
            lat = Some(parse_value_lines(&block[1..])?);
        } else if block_is_map(header, "lon") {
            lon = Some(parse_value_lines(&block[1..])?);
        }
        // time map and anything else: not needed
    }

    let (values, n_lat, n_lon) =
        values.ok_or_else(|| DapParseError::MissingDataBlock(var.to_string()))?;
    let lat = lat.ok_or_else(|| DapParseError::MissingMap("lat".to_string()))?;
    let lon = lon.ok_or_else(|| DapParseError::MissingMap("lon".to_string()))?;

    if lat.len() != n_lat || lon.len() != n_lon {
        return Err(DapParseError::ShapeMismatch {
            expected: n_lat * n_lon,
            found: lat.len() * lon.len(),
        });
    }

    trace!(n_lat, n_lon, "Parsed OPeNDAP ASCII grid");
    Ok(AsciiGrid {
        values,
        lat,
        lon,
        n_lat,
        n_lon,
    })
}

/// Everything after the dashed separator between DDS and data.
fn split_off_dds(text: &str) -> DapResult<&str> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        offset += line.len();
        if line.trim_start().starts_with("----") {
            return Ok(&text[offset..]);
        }
    }
    Err(DapParseError::MissingSeparator)
}

/// Group non-empty lines into blank-line separated blocks.
fn blocks(body: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

/// If `header` names the data variable (`dataset.var[...]` or `var[...]`),
/// return its dimension sizes.
fn block_dims(header: &str, var: &str) -> Option<Vec<usize>> {
    let name = header.split('[').next()?.trim();
    let leaf = name.rsplit('.').next()?;
    if leaf != var {
        return None;
    }
    parse_dims(header).ok()
}

fn block_is_map(header: &str, map: &str) -> bool {
    header
        .split('[')
        .next()
        .and_then(|name| name.trim().rsplit('.').next())
        .map(|leaf| leaf == map)
        .unwrap_or(false)
}

/// Parse `[time = 1][lat = 57][lon = 61]` or `[1][57][61]` dimension
/// suffixes.
fn parse_dims(header: &str) -> DapResult<Vec<usize>> {
    let mut dims = Vec::new();
    for seg in header.split('[').skip(1) {
        let inner = seg
            .split(']')
            .next()
            .ok_or_else(|| DapParseError::InvalidDimensions(header.to_string()))?;
        let num = inner.rsplit('=').next().unwrap_or(inner).trim();
        dims.push(
            num.parse::<usize>()
                .map_err(|_| DapParseError::InvalidDimensions(header.to_string()))?,
        );
    }
    if dims.is_empty() {
        return Err(DapParseError::InvalidDimensions(header.to_string()));
    }
    Ok(dims)
}

/// Parse the data rows of the variable block. The last two dimensions are
/// (lat, lon); any leading dimensions (time) must be size 1.
fn parse_data_block(lines: &[&str], dims: &[usize]) -> DapResult<(Vec<f64>, usize, usize)> {
    if dims.len() < 2 {
        return Err(DapParseError::InvalidDimensions(format!("{dims:?}")));
    }
    let n_lon = dims[dims.len() - 1];
    let n_lat = dims[dims.len() - 2];
    let leading: usize = dims[..dims.len() - 2].iter().product();
    if leading > 1 {
        return Err(DapParseError::InvalidDimensions(format!(
            "expected a single time step, got {leading}"
        )));
    }

    let expected = n_lat * n_lon;
    let mut values = Vec::with_capacity(expected);
    for line in lines {
        values.extend(parse_row(line)?);
    }

    if values.len() != expected {
        return Err(DapParseError::ShapeMismatch {
            expected,
            found: values.len(),
        });
    }
    Ok((values, n_lat, n_lon))
}

/// Parse one data or map line, stripping any leading `[i][j]` index
/// prefix.
fn parse_row(line: &str) -> DapResult<Vec<f64>> {
    let trimmed = line.trim();
    let rest = if trimmed.starts_with('[') {
        match trimmed.rfind(']') {
            Some(end) => trimmed[end + 1..].trim_start_matches(','),
            None => trimmed,
        }
    } else {
        trimmed
    };

    rest.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| DapParseError::InvalidNumber(s.to_string()))
        })
        .collect()
}

/// Parse the value lines of a coordinate map block.
fn parse_value_lines(lines: &[&str]) -> DapResult<Vec<f64>> {
    let mut out = Vec::new();
    for line in lines {
        out.extend(parse_row(line)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Dataset {
    GRID {
      ARRAY:
        Int16 sst[time = 1][lat = 2][lon = 3];
      MAPS:
        Float64 time[time = 1];
        Float32 lat[lat = 2];
        Float32 lon[lon = 3];
    } sst;
} sst.day.mean.2023;
---------------------------------------------
sst.sst[1][2][3]
[0][0], 2310, 2320, 2330
[0][1], 2340, -999, 2360

sst.time[1]
83521.0

sst.lat[2]
28.125, 28.375

sst.lon[3]
120.125, 120.375, 120.625
";

    #[test]
    fn test_parse_sample_response() {
        let grid = parse_grid_response(SAMPLE, "sst").unwrap();
        assert_eq!(grid.n_lat, 2);
        assert_eq!(grid.n_lon, 3);
        assert_eq!(grid.values.len(), 6);
        assert_eq!(grid.values[0], 2310.0);
        assert_eq!(grid.values[4], -999.0);
        assert_eq!(grid.lat, vec![28.125, 28.375]);
        assert_eq!(grid.lon, vec![120.125, 120.375, 120.625]);
    }

    #[test]
    fn test_parse_named_dims() {
        // Some servers echo the constraint with named dimensions.
        let text = SAMPLE.replace("sst.sst[1][2][3]", "sst.sst[time = 1][lat = 2][lon = 3]");
        let grid = parse_grid_response(&text, "sst").unwrap();
        assert_eq!(grid.n_lat, 2);
        assert_eq!(grid.n_lon, 3);
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            parse_grid_response("no separator here", "sst"),
            Err(DapParseError::MissingSeparator)
        ));
    }

    #[test]
    fn test_missing_map() {
        let text = SAMPLE
            .lines()
            .filter(|l| !l.contains("28.125") && !l.contains("sst.lat"))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(matches!(
            parse_grid_response(&text, "sst"),
            Err(DapParseError::MissingMap(_))
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let text = SAMPLE.replace("[0][1], 2340, -999, 2360", "[0][1], 2340, -999");
        assert!(matches!(
            parse_grid_response(&text, "sst"),
            Err(DapParseError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_number() {
        let text = SAMPLE.replace("2320", "twenty");
        assert!(matches!(
            parse_grid_response(&text, "sst"),
            Err(DapParseError::InvalidNumber(_))
        ));
    }

    #[test]
    fn test_multi_timestep_rejected() {
        let text = SAMPLE.replace("sst.sst[1][2][3]", "sst.sst[2][2][3]");
        assert!(parse_grid_response(&text, "sst").is_err());
    }
}
