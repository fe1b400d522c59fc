//! Flat binary storage of nodal fields
//!
//! Files hold fields back to back in physical space, each as
//! `n1 * n2 * n3` little-endian `f64` in row-major order, without
//! header. Readers must know the grid and seek by field index.
use super::Field3;
use crate::error::{Error, Result};
use ndarray::Array3;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

const ELEMENT_SIZE: u64 = std::mem::size_of::<f64>() as u64;

/// Read and write field data
pub trait ReadWrite {
    /// Read data from file
    ///
    /// # Errors
    /// Missing file or data not matching the grid
    fn read(&mut self, filename: &str) -> Result<()>;

    /// Write data to file
    ///
    /// # Errors
    /// File cannot be created or written
    fn write(&self, filename: &str) -> Result<()>;

    /// Read data and log the outcome
    fn read_unwrap(&mut self, filename: &str) {
        match self.read(filename) {
            Ok(_) => log::info!("Reading file {:?} was successfull.", filename),
            Err(e) => log::error!("Error while reading file {:?}. Error: {}", filename, e),
        }
    }

    /// Write data and log errors
    fn write_unwrap(&self, filename: &str) {
        if let Err(e) = self.write(filename) {
            log::error!("Error while writing file {:?}. Error: {}", filename, e);
        }
    }
}

/// Write `fields` consecutively to `path`
///
/// # Errors
/// File cannot be created or written
pub fn write_fields<P: AsRef<Path>>(path: P, fields: &[&Array3<f64>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for field in fields {
        for x in field.iter() {
            writer.write_all(&x.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read field number `index` of `path` into `out`
///
/// # Errors
/// Missing file, or file too short for the requested field
pub fn read_field<P: AsRef<Path>>(path: P, index: usize, out: &mut Array3<f64>) -> Result<()> {
    let path = path.as_ref();
    let mut file = File::open(path)?;
    let field_bytes = out.len() as u64 * ELEMENT_SIZE;
    let offset = index as u64 * field_bytes;
    let file_len = file.metadata()?.len();
    if file_len < offset + field_bytes {
        return Err(Error::Shape(format!(
            "{:?} holds {} bytes, field {} needs {}",
            path,
            file_len,
            index,
            offset + field_bytes
        )));
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0_u8; field_bytes as usize];
    BufReader::new(file).read_exact(&mut buf)?;
    for (x, chunk) in out.iter_mut().zip(buf.chunks_exact(ELEMENT_SIZE as usize)) {
        let mut bytes = [0_u8; 8];
        bytes.copy_from_slice(chunk);
        *x = f64::from_le_bytes(bytes);
    }
    Ok(())
}

impl ReadWrite for Field3 {
    fn read(&mut self, filename: &str) -> Result<()> {
        read_field(filename, 0, &mut self.v)?;
        self.forward();
        Ok(())
    }

    fn write(&self, filename: &str) -> Result<()> {
        write_fields(filename, &[&self.v])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Bc, Space3};
    use std::sync::Arc;

    #[test]
    fn test_seek_by_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.000000.fields");
        let a = Array3::from_shape_fn((3, 2, 4), |(i, j, k)| (i * 8 + j * 4 + k) as f64);
        let b = a.mapv(|x| -x);
        write_fields(&path, &[&a, &b]).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * 24 * 8);

        let mut out = Array3::zeros((3, 2, 4));
        read_field(&path, 1, &mut out).unwrap();
        assert_eq!(out, b);
        read_field(&path, 0, &mut out).unwrap();
        assert_eq!(out, a);
        assert!(matches!(read_field(&path, 2, &mut out), Err(Error::Shape(_))));
    }

    #[test]
    fn test_field_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("field.bin");
        let filename = filename.to_str().unwrap();
        let space = Arc::new(Space3::new([6, 1, 5], [1., 1., 1.]));
        let mut field = Field3::new(&space, Bc::Neumann);
        field.set_nodal(|x, _, z| x + z);
        field.write(filename).unwrap();
        let mut other = Field3::new(&space, Bc::Neumann);
        other.read(filename).unwrap();
        assert_eq!(other.v, field.v);
    }
}
