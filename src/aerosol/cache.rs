//! Text cache of computed aerosol models.
//!
//! Layout:
//!
//! ```text
//! # aerosol model cache
//! model <name>
//! nodes <n>
//! <20 rows: λ ext sca ω g raw_ext raw_sca>
//! phase
//! <n rows: cos θ, then one value per wavelength>
//! q
//! ...
//! u
//! ...
//! ```
//!
//! Numbers are written in shortest round-trip exponential form, so
//! reading a cache back reproduces the tables exactly.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use super::{NB_WAVELENGTHS, OpticalTable, WAVELENGTHS};
use crate::error::{EngineError, Result};
use crate::quadrature::AerosolGrid;

/// Writes `table` to `path` through a temporary file in the same directory.
pub fn write(path: &Path, table: &OpticalTable, grid: &AerosolGrid) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let out = tmp.as_file_mut();
        writeln!(out, "# aerosol model cache")?;
        writeln!(out, "model {}", table.name)?;
        writeln!(out, "nodes {}", table.nodes())?;
        for l in 0..NB_WAVELENGTHS {
            writeln!(
                out,
                "{:e} {:e} {:e} {:e} {:e} {:e} {:e}",
                WAVELENGTHS[l],
                table.extinction[l],
                table.scattering[l],
                table.single_scattering_albedo(l),
                table.asymmetry[l],
                table.raw_extinction[l],
                table.raw_scattering[l]
            )?;
        }
        for (label, block) in [("phase", &table.p11), ("q", &table.q), ("u", &table.u)] {
            writeln!(out, "{}", label)?;
            for k in 0..table.nodes() {
                let cos = grid.cos.get(k).copied().unwrap_or(f64::NAN);
                let row: Vec<String> = block.iter().map(|v| format!("{:e}", v[k])).collect();
                writeln!(out, "{:e} {}", cos, row.join(" "))?;
            }
        }
        out.flush()?;
    }
    tmp.persist(path)
        .map_err(|e| EngineError::cache(path, e.to_string()))?;
    Ok(())
}

fn parse_row(path: &Path, line: &str, expected: usize) -> Result<Vec<f64>> {
    let values: Vec<f64> = line
        .split_whitespace()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|e| EngineError::cache(path, format!("bad number {:?}: {}", t, e)))
        })
        .collect::<Result<_>>()?;
    if values.len() != expected {
        return Err(EngineError::cache(
            path,
            format!("expected {} values, found {}", expected, values.len()),
        ));
    }
    Ok(values)
}

/// Reads a cache written by [`write`].
pub fn read(path: &Path) -> Result<OpticalTable> {
    let file = File::open(path).map_err(|e| EngineError::cache(path, e.to_string()))?;
    let mut lines = BufReader::new(file)
        .lines()
        .filter(|l| !matches!(l, Ok(s) if s.trim().is_empty() || s.starts_with('#')));

    let mut next = |what: &str| -> Result<String> {
        match lines.next() {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(EngineError::cache(path, e.to_string())),
            None => Err(EngineError::cache(path, format!("truncated before {}", what))),
        }
    };

    let header = next("model")?;
    let name = header
        .strip_prefix("model ")
        .ok_or_else(|| EngineError::cache(path, "missing model header"))?
        .to_string();
    let nodes: usize = next("nodes")?
        .strip_prefix("nodes ")
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| EngineError::cache(path, "missing node count"))?;

    let mut table = OpticalTable::empty();
    table.name = name;
    for l in 0..NB_WAVELENGTHS {
        let row = parse_row(path, &next("spectral rows")?, 7)?;
        table.extinction[l] = row[1];
        table.scattering[l] = row[2];
        table.asymmetry[l] = row[4];
        table.raw_extinction[l] = row[5];
        table.raw_scattering[l] = row[6];
    }

    let mut blocks = Vec::with_capacity(3);
    for label in ["phase", "q", "u"] {
        if next(label)?.trim() != label {
            return Err(EngineError::cache(path, format!("missing {} block", label)));
        }
        let mut block = vec![vec![0.0; nodes]; NB_WAVELENGTHS];
        for k in 0..nodes {
            let row = parse_row(path, &next(label)?, NB_WAVELENGTHS + 1)?;
            for l in 0..NB_WAVELENGTHS {
                block[l][k] = row[l + 1];
            }
        }
        blocks.push(block);
    }
    if nodes > 0 {
        table.u = blocks.pop().unwrap_or_default();
        table.q = blocks.pop().unwrap_or_default();
        table.p11 = blocks.pop().unwrap_or_default();
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::{AerosolModel, BuildOptions};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cache_round_trip() {
        let grid = AerosolGrid::standard().unwrap();
        let table = AerosolModel::Urban
            .build(&BuildOptions { grid: &grid, cache: None })
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("urban.aer");
        write(&path, &table, &grid).unwrap();
        let back = read(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_size_distribution_build_writes_cache() {
        use crate::aerosol::mie::{Distribution, Mode, SizeDistribution};
        let grid = AerosolGrid::new(21).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("mie.aer");
        let model = AerosolModel::SizeDistribution(SizeDistribution {
            r_min: 0.05,
            r_max: 0.5,
            modes: vec![Mode {
                distribution: Distribution::ModifiedGamma { alpha: 2.0, b: 20.0, gamma: 1.0 },
                fraction: 1.0,
                real_index: vec![1.5],
                imag_index: vec![0.005],
            }],
        });
        let built = model
            .build(&BuildOptions { grid: &grid, cache: Some(&path) })
            .unwrap();
        let cached = AerosolModel::FromCache { path: path.clone() }
            .build(&BuildOptions { grid: &grid, cache: None })
            .unwrap();
        assert_eq!(built, cached);
    }

    #[test]
    fn test_missing_and_malformed_cache() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.aer");
        assert!(matches!(read(&missing), Err(EngineError::Cache { .. })));

        let bad = dir.path().join("bad.aer");
        fs::write(&bad, "model x\nnodes 3\n1 2 3\n").unwrap();
        assert!(matches!(read(&bad), Err(EngineError::Cache { .. })));
    }
}
