//! NIfTI file I/O
//!
//! Loads and saves NIfTI-1 volumes from/to byte arrays or files. Byte-level
//! functions are what the WASM exports use, where filesystem access is not
//! available; the file helpers wrap them for native callers.

use std::io::Cursor;
use std::path::Path;
use nifti::{NiftiObject, InMemNiftiObject, NiftiHeader};
use nifti::volume::ndarray::IntoNdArray;
use flate2::read::GzDecoder;
use ndarray::Array;

use crate::error::{Result, SurfingError};

/// NIfTI volume held in memory
#[derive(Clone, Debug, PartialEq)]
pub struct NiftiData {
    /// Voxel values in Fortran order: index = x + y*nx + z*nx*ny + t*nx*ny*nz
    pub data: Vec<f64>,
    /// Dimensions (nx, ny, nz, nt); nt is 1 for 3D volumes
    pub dims: (usize, usize, usize, usize),
    /// Voxel sizes in mm
    pub voxel_size: (f64, f64, f64),
    /// Affine transformation matrix (4x4, row-major)
    pub affine: [f64; 16],
}

impl NiftiData {
    /// Wrap in-memory voxel values; voxel sizes are taken from the affine columns
    pub fn new(data: Vec<f64>, dims: (usize, usize, usize, usize), affine: [f64; 16]) -> Result<Self> {
        let (nx, ny, nz, nt) = dims;
        let expected = nx * ny * nz * nt;
        if data.len() != expected {
            return Err(SurfingError::Nifti(format!(
                "data has {} values, dims {}x{}x{}x{} need {}",
                data.len(), nx, ny, nz, nt, expected
            )));
        }

        let column_norm = |c: usize| {
            (affine[c].powi(2) + affine[4 + c].powi(2) + affine[8 + c].powi(2)).sqrt()
        };

        Ok(NiftiData {
            data,
            dims,
            voxel_size: (column_norm(0), column_norm(1), column_norm(2)),
            affine,
        })
    }

    /// Number of voxels in one 3D volume
    pub fn nvoxels(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    /// Values of the `t`-th 3D volume
    pub fn volume(&self, t: usize) -> Result<&[f64]> {
        let n = self.nvoxels();
        if t >= self.dims.3 {
            return Err(SurfingError::Nifti(format!(
                "volume {} requested, image has {} volumes", t, self.dims.3
            )));
        }
        self.data.get(t * n..(t + 1) * n).ok_or_else(|| {
            SurfingError::Nifti(format!(
                "data has {} values, too few for volume {} of {} voxels", self.data.len(), t, n
            ))
        })
    }
}

/// Check if bytes are gzip compressed
fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

/// Get header info for diagnostics
fn get_header_info(bytes: &[u8]) -> String {
    if bytes.len() < 348 {
        return format!("File too small ({} bytes, need at least 348)", bytes.len());
    }

    let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let magic = String::from_utf8_lossy(&bytes[344..348]).to_string();
    let datatype = i16::from_le_bytes([bytes[70], bytes[71]]);

    format!("sizeof_hdr={}, magic='{}', datatype={}", sizeof_hdr, magic, datatype)
}

/// Load a 3D or 4D NIfTI volume from bytes
///
/// Supports both .nii and .nii.gz content (gzip is auto-detected)
pub fn load_nifti(bytes: &[u8]) -> Result<NiftiData> {
    let obj: InMemNiftiObject = if is_gzip(bytes) {
        let decoder = GzDecoder::new(Cursor::new(bytes));
        InMemNiftiObject::from_reader(decoder)
            .map_err(|e| {
                let mut decoder2 = GzDecoder::new(Cursor::new(bytes));
                let mut decompressed = Vec::new();
                let info = if std::io::Read::read_to_end(&mut decoder2, &mut decompressed).is_ok() {
                    get_header_info(&decompressed)
                } else {
                    "Could not decompress".to_string()
                };
                SurfingError::Nifti(format!("Failed to read gzipped NIfTI: {} ({})", e, info))
            })?
    } else {
        let info = get_header_info(bytes);
        InMemNiftiObject::from_reader(Cursor::new(bytes))
            .map_err(|e| SurfingError::Nifti(format!("Failed to read NIfTI: {} ({})", e, info)))?
    };

    let header = obj.header();
    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(SurfingError::Nifti(format!("Expected at least 3D volume, got {}D", ndim)));
    }

    let affine = get_affine(header);

    let volume = obj.into_volume();
    let array: Array<f64, _> = volume.into_ndarray()
        .map_err(|e| SurfingError::Nifti(format!("Failed to convert to ndarray: {}", e)))?;

    // Use the actual array shape for dimensions (nifti-rs may drop trailing 1s)
    let shape = array.shape().to_vec();
    if shape.len() < 3 {
        return Err(SurfingError::Nifti(format!("Expected at least 3D array, got {}D", shape.len())));
    }
    if shape.len() > 4 && shape[4..].iter().any(|&d| d != 1) {
        return Err(SurfingError::Nifti(format!("Volumes with more than 4 dimensions are not supported: {:?}", shape)));
    }

    let (nx, ny, nz) = (shape[0], shape[1], shape[2]);
    let nt = if shape.len() >= 4 { shape[3] } else { 1 };

    let mut data = Vec::with_capacity(nx * ny * nz * nt);
    if shape.len() == 3 {
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    data.push(array[[i, j, k]]);
                }
            }
        }
    } else {
        let array = array
            .into_shape((nx, ny, nz, nt))
            .map_err(|e| SurfingError::Nifti(format!("Failed to reshape volume: {}", e)))?;
        for t in 0..nt {
            for k in 0..nz {
                for j in 0..ny {
                    for i in 0..nx {
                        data.push(array[[i, j, k, t]]);
                    }
                }
            }
        }
    }

    tracing::debug!(nx, ny, nz, nt, "loaded NIfTI volume");

    NiftiData::new(data, (nx, ny, nz, nt), affine)
}

/// Load a NIfTI volume (.nii or .nii.gz) from disk
pub fn read_nifti_file(path: impl AsRef<Path>) -> Result<NiftiData> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SurfingError::io(path, e))?;
    load_nifti(&bytes)
}

/// Get affine transformation matrix from header
fn get_affine(header: &NiftiHeader) -> [f64; 16] {
    // Prefer sform if available (sform_code > 0)
    if header.sform_code > 0 {
        let s = &header.srow_x;
        let t = &header.srow_y;
        let u = &header.srow_z;
        [
            s[0] as f64, s[1] as f64, s[2] as f64, s[3] as f64,
            t[0] as f64, t[1] as f64, t[2] as f64, t[3] as f64,
            u[0] as f64, u[1] as f64, u[2] as f64, u[3] as f64,
            0.0, 0.0, 0.0, 1.0,
        ]
    } else {
        // Fall back to identity with voxel scaling
        let vsx = header.pixdim[1] as f64;
        let vsy = header.pixdim[2] as f64;
        let vsz = header.pixdim[3] as f64;
        [
            vsx, 0.0, 0.0, 0.0,
            0.0, vsy, 0.0, 0.0,
            0.0, 0.0, vsz, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

/// Save a volume as NIfTI bytes
///
/// Writes an uncompressed single-file .nii with float32 voxels and an sform
pub fn save_nifti(volume: &NiftiData) -> Result<Vec<u8>> {
    use std::io::Write;

    let (nx, ny, nz, nt) = volume.dims;
    let (vsx, vsy, vsz) = volume.voxel_size;
    let affine = &volume.affine;

    for (name, d) in [("nx", nx), ("ny", ny), ("nz", nz), ("nt", nt)] {
        if d == 0 || d > i16::MAX as usize {
            return Err(SurfingError::Nifti(format!("{} = {} cannot be stored in a NIfTI-1 header", name, d)));
        }
    }

    let mut header = [0u8; 348];

    // sizeof_hdr = 348
    header[0..4].copy_from_slice(&348i32.to_le_bytes());

    // dim[0..7]
    let ndim: i16 = if nt > 1 { 4 } else { 3 };
    let dim: [i16; 8] = [ndim, nx as i16, ny as i16, nz as i16, nt as i16, 1, 1, 1];
    for (i, &d) in dim.iter().enumerate() {
        let offset = 40 + i * 2;
        header[offset..offset + 2].copy_from_slice(&d.to_le_bytes());
    }

    // datatype = 16 (FLOAT32), bitpix = 32
    header[70..72].copy_from_slice(&16i16.to_le_bytes());
    header[72..74].copy_from_slice(&32i16.to_le_bytes());

    // pixdim[0..7]
    let pixdim: [f32; 8] = [1.0, vsx as f32, vsy as f32, vsz as f32, 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        let offset = 76 + i * 4;
        header[offset..offset + 4].copy_from_slice(&p.to_le_bytes());
    }

    // vox_offset = 352 (header + 4 bytes extension)
    header[108..112].copy_from_slice(&352.0f32.to_le_bytes());

    // scl_slope = 1.0, scl_inter = 0.0
    header[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    header[116..120].copy_from_slice(&0.0f32.to_le_bytes());

    // sform_code = 1 (scanner anat)
    header[254..256].copy_from_slice(&1i16.to_le_bytes());

    // srow_x, srow_y, srow_z
    for row in 0..3 {
        for col in 0..4 {
            let offset = 280 + row * 16 + col * 4;
            header[offset..offset + 4].copy_from_slice(&(affine[row * 4 + col] as f32).to_le_bytes());
        }
    }

    // magic = "n+1\0" for NIfTI-1 single file
    header[344..348].copy_from_slice(b"n+1\0");

    let mut buffer = Vec::with_capacity(352 + volume.data.len() * 4);
    buffer.write_all(&header)
        .map_err(|e| SurfingError::Nifti(format!("Write header failed: {}", e)))?;
    buffer.write_all(&[0u8; 4])
        .map_err(|e| SurfingError::Nifti(format!("Write extension failed: {}", e)))?;
    for &val in &volume.data {
        buffer.write_all(&(val as f32).to_le_bytes())
            .map_err(|e| SurfingError::Nifti(format!("Write data failed: {}", e)))?;
    }

    Ok(buffer)
}

/// Save a volume as gzipped NIfTI bytes (.nii.gz)
pub fn save_nifti_gz(volume: &NiftiData) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let uncompressed = save_nifti(volume)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&uncompressed)
        .map_err(|e| SurfingError::Nifti(format!("Gzip compression failed: {}", e)))?;

    encoder.finish()
        .map_err(|e| SurfingError::Nifti(format!("Gzip finish failed: {}", e)))
}

/// Write a volume to disk; a `.gz` extension selects gzip compression
pub fn write_nifti_file(path: impl AsRef<Path>, volume: &NiftiData) -> Result<()> {
    let path = path.as_ref();
    let bytes = if path.extension().map_or(false, |e| e == "gz") {
        save_nifti_gz(volume)?
    } else {
        save_nifti(volume)?
    };
    std::fs::write(path, bytes).map_err(|e| SurfingError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: [f64; 16] = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];

    #[test]
    fn test_affine_identity() {
        let mut header = NiftiHeader::default();
        header.pixdim[1] = 1.0;
        header.pixdim[2] = 2.0;
        header.pixdim[3] = 3.0;
        header.sform_code = 0;

        let affine = get_affine(&header);
        assert_eq!(affine[0], 1.0);
        assert_eq!(affine[5], 2.0);
        assert_eq!(affine[10], 3.0);
    }

    #[test]
    fn test_gzip_detection() {
        assert!(is_gzip(&[0x1f, 0x8b, 0x00]));
        assert!(!is_gzip(&[0x00, 0x00, 0x00]));
        assert!(!is_gzip(&[0x1f])); // Too short
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(NiftiData::new(vec![0.0; 7], (2, 2, 2, 1), IDENTITY).is_err());
    }

    #[test]
    fn test_voxel_size_from_affine() {
        let mut affine = IDENTITY;
        affine[0] = 3.0;
        affine[5] = -2.5;
        let vol = NiftiData::new(vec![0.0; 8], (2, 2, 2, 1), affine).unwrap();
        assert_eq!(vol.voxel_size, (3.0, 2.5, 1.0));
    }

    #[test]
    fn test_save_nifti_header() {
        let vol = NiftiData::new(vec![0.0; 16], (2, 2, 2, 2), IDENTITY).unwrap();
        let bytes = save_nifti(&vol).unwrap();

        assert_eq!(bytes.len(), 352 + 16 * 4);
        assert_eq!(&bytes[344..348], b"n+1\0");

        let sizeof_hdr = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(sizeof_hdr, 348);

        let ndim = i16::from_le_bytes([bytes[40], bytes[41]]);
        let nt = i16::from_le_bytes([bytes[48], bytes[49]]);
        assert_eq!((ndim, nt), (4, 2));
    }

    #[test]
    fn test_roundtrip_4d_keeps_voxel_order() {
        let data: Vec<f64> = (0..3 * 4 * 2 * 2).map(|v| v as f64).collect();
        let mut affine = IDENTITY;
        affine[3] = -10.0;
        let vol = NiftiData::new(data, (3, 4, 2, 2), affine).unwrap();

        let loaded = load_nifti(&save_nifti_gz(&vol).unwrap()).unwrap();
        assert_eq!(loaded.dims, (3, 4, 2, 2));
        assert_eq!(loaded.affine, vol.affine);
        assert_eq!(loaded.data, vol.data);
        assert_eq!(loaded.volume(1).unwrap()[0], 24.0);
    }

    #[test]
    fn test_volume_out_of_range() {
        let vol = NiftiData::new(vec![1.0; 8], (2, 2, 2, 1), IDENTITY).unwrap();
        assert_eq!(vol.volume(0).unwrap().len(), 8);
        assert!(matches!(vol.volume(1), Err(SurfingError::Nifti(_))));

        // Fields are public, so dims and data can disagree
        let mut short = vol.clone();
        short.dims.3 = 2;
        assert!(matches!(short.volume(1), Err(SurfingError::Nifti(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_nifti_file("/nonexistent/volume.nii").unwrap_err();
        assert!(matches!(err, SurfingError::Io { .. }));
    }
}
