//! Calibration-parameter CSV: one row per wrench axis.
//!
//! Linear layout:
//! Wrench,C,L_s0,...,L_s7
//!
//! Quadratic layout appends Q_s0s0,Q_s0s1,...,Q_s7s7 in `MONOMIAL_PAIRS` order.
//! Any other header is rejected, including a quadratic header whose Q columns are
//! permuted: the coefficients would load without error but apply to the wrong terms.
use std::fs::File;
use std::path::{Path, PathBuf};

use ftcal_traits::layout::{AXIS_NAMES, CHANNEL_NAMES, N_AXES, N_CHANNELS, N_MONOMIALS, monomial_column};

/// Coefficients exactly as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedParams {
    pub c: [f64; N_AXES],
    pub l: [[f64; N_CHANNELS]; N_AXES],
    pub q: Option<[[f64; N_MONOMIALS]; N_AXES]>,
}

/// Column names of a parameter file.
pub fn params_header(quadratic: bool) -> Vec<String> {
    let mut cols = vec!["Wrench".to_string(), "C".to_string()];
    cols.extend(CHANNEL_NAMES.iter().map(|s| format!("L_{s}")));
    if quadratic {
        cols.extend((0..N_MONOMIALS).map(monomial_column));
    }
    cols
}

pub fn load_params_csv(path: &Path) -> eyre::Result<PersistedParams> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open parameter CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.trim().to_string()).collect();
    let quadratic = if actual == params_header(false) {
        false
    } else if actual == params_header(true) {
        true
    } else {
        eyre::bail!(
            "parameter CSV must have headers 'Wrench,C,L_s0..L_s7[,Q_s0s0..Q_s7s7]', got: {}",
            actual.join(",")
        );
    };

    let mut c = [0.0; N_AXES];
    let mut l = [[0.0; N_CHANNELS]; N_AXES];
    let mut q = [[0.0; N_MONOMIALS]; N_AXES];
    let mut axis = 0usize;
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if axis >= N_AXES {
            eyre::bail!("parameter CSV has more than {} rows", N_AXES);
        }
        let name = rec.get(0).unwrap_or_default().trim();
        if name != AXIS_NAMES[axis] {
            eyre::bail!(
                "parameter CSV row {} must be '{}', got '{}'",
                idx + 2,
                AXIS_NAMES[axis],
                name
            );
        }
        let num = |col: usize| -> eyre::Result<f64> {
            let field = rec.get(col).unwrap_or_default().trim();
            field
                .parse::<f64>()
                .map_err(|e| eyre::eyre!("row {} column {}: '{}' ({})", idx + 2, col + 1, field, e))
        };
        c[axis] = num(1)?;
        for k in 0..N_CHANNELS {
            l[axis][k] = num(2 + k)?;
        }
        if quadratic {
            for k in 0..N_MONOMIALS {
                q[axis][k] = num(2 + N_CHANNELS + k)?;
            }
        }
        axis += 1;
    }
    if axis != N_AXES {
        eyre::bail!("parameter CSV must have {} rows (Fx..Mz), got {}", N_AXES, axis);
    }

    Ok(PersistedParams {
        c,
        l,
        q: quadratic.then_some(q),
    })
}

/// Write parameters; the file only appears once it is complete.
pub fn write_params_csv(path: &Path, params: &PersistedParams) -> eyre::Result<()> {
    write_csv_atomically(path, |wtr| -> eyre::Result<()> {
        wtr.write_record(params_header(params.q.is_some()))?;
        for axis in 0..N_AXES {
            let mut row = Vec::with_capacity(2 + N_CHANNELS + N_MONOMIALS);
            row.push(AXIS_NAMES[axis].to_string());
            row.push(params.c[axis].to_string());
            row.extend(params.l[axis].iter().map(f64::to_string));
            if let Some(q) = &params.q {
                row.extend(q[axis].iter().map(f64::to_string));
            }
            wtr.write_record(&row)?;
        }
        Ok(())
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Fill a CSV writer and move the result over `path` only when `fill` succeeds.
/// On failure the partial file is removed and `path` is left untouched.
pub fn write_csv_atomically<E, F>(path: &Path, fill: F) -> Result<(), E>
where
    E: From<std::io::Error> + From<csv::Error>,
    F: FnOnce(&mut csv::Writer<File>) -> Result<(), E>,
{
    let tmp = tmp_path(path);
    let file = File::create(&tmp)?;
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    let filled = fill(&mut wtr).and_then(|()| wtr.flush().map_err(E::from));
    drop(wtr);
    match filled {
        Ok(()) => {
            std::fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e)
        }
    }
}
