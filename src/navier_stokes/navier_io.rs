//! Implement io routines for `Navier3D`
use super::functions::add_profile;
use super::navier::Navier3D;
use crate::error::Result;
use crate::field::io::{read_field, write_fields, ReadWrite};
use crate::navier_stokes_lnse::trajectory::{Snapshot, SnapshotStore};

impl Navier3D {
    /// Total flow (background included) in physical space
    pub fn snapshot(&self) -> Snapshot {
        let mut u1 = self.space.ndarray_physical();
        let mut b = self.space.ndarray_physical();
        add_profile(&mut u1, &self.u1.v, &self.background_u.v);
        add_profile(&mut b, &self.b.v, &self.background_b.v);
        Snapshot {
            u1,
            u2: self.u2.v.to_owned(),
            u3: self.u3.v.to_owned(),
            b,
        }
    }

    /// Save the total flow at the current time
    ///
    /// # Errors
    /// Failed to write
    pub fn store_snapshot(&self, store: &mut SnapshotStore) -> Result<()> {
        store.store(self.time, self.snapshot())
    }
}

impl ReadWrite for Navier3D {
    /// Read perturbation {u1, u2, u3, b}
    fn read(&mut self, filename: &str) -> Result<()> {
        read_field(filename, 0, &mut self.u1.v)?;
        read_field(filename, 1, &mut self.u2.v)?;
        read_field(filename, 2, &mut self.u3.v)?;
        read_field(filename, 3, &mut self.b.v)?;
        for field in [&mut self.u1, &mut self.u2, &mut self.u3, &mut self.b] {
            field.forward();
        }
        self.p.zero();
        self.reset_explicit();
        log::info!(" <== {:?}", filename);
        Ok(())
    }

    /// Write perturbation {u1, u2, u3, b}
    fn write(&self, filename: &str) -> Result<()> {
        write_fields(filename, &[&self.u1.v, &self.u2.v, &self.u3.v, &self.b.v])?;
        log::info!(" ==> {:?}", filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;

    #[test]
    fn test_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let filename = dir.path().join("flow.fields");
        let filename = filename.to_str().unwrap();
        let params = Params {
            n1: 8,
            n2: 4,
            n3: 9,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params.clone()).unwrap();
        navier.random_disturbance(0.5).unwrap();
        navier.write(filename).unwrap();

        let mut other = Navier3D::new(params).unwrap();
        other.read(filename).unwrap();
        other.populate_nodal();
        for (a, b) in navier.b.v.iter().zip(other.b.v.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!((navier.kinetic_energy() - other.kinetic_energy()).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_includes_background() {
        let params = Params {
            n1: 4,
            n2: 1,
            n3: 9,
            ..Params::default()
        };
        let mut navier = Navier3D::new(params).unwrap();
        navier.set_background(|z| z.tanh(), |z| 2. * z);
        let snap = navier.snapshot();
        let z = &navier.space.x[2];
        assert!((snap.u1[[1, 0, 2]] - z[2].tanh()).abs() < 1e-14);
        assert!((snap.b[[3, 0, 7]] - 2. * z[7]).abs() < 1e-14);
        assert_eq!(snap.u3.iter().fold(0., |m: f64, x| m.max(x.abs())), 0.);
    }
}
