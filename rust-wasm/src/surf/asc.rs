//! FreeSurfer ASCII surface format
//!
//! ```text
//! #!ascii version of <name>
//! <nvertices> <nfaces>
//! x y z 0          (nvertices lines)
//! a b c 0          (nfaces lines)
//! ```
//!
//! Coordinates are written with Rust's shortest round-trip float formatting,
//! so a surface read back from disk is bit-identical to the one written.

use std::fmt::Write as _;
use std::path::Path;

use super::Surface;
use crate::error::{Result, SurfingError};

/// Parse ASCII surface text
pub fn from_asc_string(text: &str) -> Result<Surface> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(n, l)| (n + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

    let (line_no, header) = lines
        .next()
        .ok_or_else(|| SurfingError::SurfaceFormat("missing vertex/face count line".into()))?;
    let counts = parse_fields::<usize>(header, line_no)?;
    if counts.len() < 2 {
        return Err(SurfingError::SurfaceFormat(format!(
            "line {}: expected '<nvertices> <nfaces>', got '{}'", line_no, header
        )));
    }
    let (nv, nf) = (counts[0], counts[1]);

    let mut vertices = Vec::with_capacity(nv);
    for _ in 0..nv {
        let (line_no, line) = lines.next().ok_or_else(|| {
            SurfingError::SurfaceFormat(format!("expected {} vertices, file ended after {}", nv, vertices.len()))
        })?;
        let v = parse_fields::<f64>(line, line_no)?;
        if v.len() < 3 {
            return Err(SurfingError::SurfaceFormat(format!("line {}: vertex needs 3 coordinates", line_no)));
        }
        vertices.push([v[0], v[1], v[2]]);
    }

    let mut faces = Vec::with_capacity(nf);
    for _ in 0..nf {
        let (line_no, line) = lines.next().ok_or_else(|| {
            SurfingError::SurfaceFormat(format!("expected {} faces, file ended after {}", nf, faces.len()))
        })?;
        let f = parse_fields::<usize>(line, line_no)?;
        if f.len() < 3 {
            return Err(SurfingError::SurfaceFormat(format!("line {}: face needs 3 vertex indices", line_no)));
        }
        faces.push([f[0], f[1], f[2]]);
    }

    Surface::new(vertices, faces)
}

fn parse_fields<T: std::str::FromStr>(line: &str, line_no: usize) -> Result<Vec<T>> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<T>().map_err(|_| {
                SurfingError::SurfaceFormat(format!("line {}: cannot parse '{}'", line_no, tok))
            })
        })
        .collect()
}

/// Render a surface as ASCII text
pub fn to_asc_string(surface: &Surface) -> String {
    let mut out = String::with_capacity(32 * (surface.nvertices() + surface.nfaces()) + 64);
    // Writing into a String cannot fail
    let _ = writeln!(out, "#!ascii version of surface");
    let _ = writeln!(out, "{} {}", surface.nvertices(), surface.nfaces());
    for v in surface.vertices() {
        let _ = writeln!(out, "{} {} {} 0", v[0], v[1], v[2]);
    }
    for f in surface.faces() {
        let _ = writeln!(out, "{} {} {} 0", f[0], f[1], f[2]);
    }
    out
}

/// Read an ASCII surface file
pub fn read_asc(path: impl AsRef<Path>) -> Result<Surface> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| SurfingError::io(path, e))?;
    from_asc_string(&text)
}

/// Write an ASCII surface file, replacing any existing file
pub fn write_asc(path: impl AsRef<Path>, surface: &Surface) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_asc_string(surface)).map_err(|e| SurfingError::io(path, e))
}
