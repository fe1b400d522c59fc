//! Stored direct flow and its interpolation in time
//!
//! A forward run saves the total flow (background included) at a series
//! of times into a [`SnapshotStore`]. The linearized and adjoint
//! equations reconstruct the direct flow at arbitrary stage times with
//! a [`Trajectory`], which interpolates linearly between the two
//! bracketing snapshots.
//!
//! Queries must move in the direction the trajectory was opened with.
//! Directory stores keep the bracketing pair in memory and load a single
//! new snapshot when the query moves into the neighbouring interval.
use crate::error::{Error, Result};
use crate::field::io::{read_field, write_fields};
use crate::field::{Bc, Field3, Space3};
use ndarray::{Array3, Zip};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension of snapshot files
const EXTENSION: &str = "fields";

/// Playback direction of a trajectory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Increasing time (linearized equations)
    Forward,
    /// Decreasing time (adjoint equations)
    Backward,
}

/// Total flow {u1 + U_, u2, u3, b + B_} in physical space
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// Streamwise velocity
    pub u1: Array3<f64>,
    /// Spanwise velocity
    pub u2: Array3<f64>,
    /// Vertical velocity
    pub u3: Array3<f64>,
    /// Buoyancy
    pub b: Array3<f64>,
}

impl Snapshot {
    /// Zero snapshot of `shape`
    pub fn zeros(shape: [usize; 3]) -> Self {
        Self {
            u1: Array3::zeros(shape),
            u2: Array3::zeros(shape),
            u3: Array3::zeros(shape),
            b: Array3::zeros(shape),
        }
    }

    fn arrays(&self) -> [&Array3<f64>; 4] {
        [&self.u1, &self.u2, &self.u3, &self.b]
    }

    /// Write to `path` in field order u1, u2, u3, b
    ///
    /// # Errors
    /// File cannot be written
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_fields(path, &self.arrays())
    }

    /// Read snapshot on grid `shape` from `path`
    ///
    /// # Errors
    /// Missing file, or file too short for the grid
    pub fn read<P: AsRef<Path>>(path: P, shape: [usize; 3]) -> Result<Self> {
        let path = path.as_ref();
        let mut snap = Self::zeros(shape);
        read_field(path, 0, &mut snap.u1)?;
        read_field(path, 1, &mut snap.u2)?;
        read_field(path, 2, &mut snap.u3)?;
        read_field(path, 3, &mut snap.b)?;
        log::debug!(" <== {:?}", path);
        Ok(snap)
    }
}

/// Saved forward run
#[derive(Debug)]
pub enum SnapshotStore {
    /// Snapshots kept in memory, sorted by time
    Memory {
        /// Snapshot times
        times: Vec<f64>,
        /// Snapshots in order of `times`
        snapshots: Vec<Snapshot>,
    },
    /// One `<time>.fields` file per snapshot
    Directory {
        /// Snapshot directory
        path: PathBuf,
        /// Grid of the stored fields
        shape: [usize; 3],
    },
}

impl SnapshotStore {
    /// Empty in-memory store
    pub fn memory() -> Self {
        Self::Memory {
            times: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Store writing into `path`, created if missing
    ///
    /// # Errors
    /// Directory cannot be created
    pub fn directory<P: AsRef<Path>>(path: P, shape: [usize; 3]) -> Result<Self> {
        fs::create_dir_all(&path)?;
        Ok(Self::Directory {
            path: path.as_ref().to_path_buf(),
            shape,
        })
    }

    /// Save `snapshot` at `time`, replacing a snapshot at the same time
    ///
    /// # Errors
    /// File cannot be written
    pub fn store(&mut self, time: f64, snapshot: Snapshot) -> Result<()> {
        match self {
            Self::Memory { times, snapshots } => {
                let pos = times.partition_point(|&t| t < time - tolerance(time));
                if pos < times.len() && (times[pos] - time).abs() <= tolerance(time) {
                    snapshots[pos] = snapshot;
                } else {
                    times.insert(pos, time);
                    snapshots.insert(pos, snapshot);
                }
                Ok(())
            }
            Self::Directory { path, .. } => snapshot.write(path.join(snapshot_filename(time))),
        }
    }

    /// Remove all snapshots
    ///
    /// # Errors
    /// Snapshot files cannot be removed
    pub fn clear(&mut self) -> Result<()> {
        match self {
            Self::Memory { times, snapshots } => {
                times.clear();
                snapshots.clear();
            }
            Self::Directory { path, .. } => {
                for (_, file) in build_filename_map(path)? {
                    fs::remove_file(file)?;
                }
            }
        }
        Ok(())
    }

    /// Number of stored snapshots
    ///
    /// # Errors
    /// Directory cannot be scanned
    pub fn len(&self) -> Result<usize> {
        match self {
            Self::Memory { times, .. } => Ok(times.len()),
            Self::Directory { path, .. } => Ok(build_filename_map(path)?.len()),
        }
    }

    /// Store without snapshots
    ///
    /// # Errors
    /// Directory cannot be scanned
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// File name of the snapshot at `time`
pub fn snapshot_filename(time: f64) -> String {
    format!("{:.6}.{}", time, EXTENSION)
}

/// Absolute slack when comparing times
fn tolerance(time: f64) -> f64 {
    1e-9 * time.abs().max(1.)
}

/// Scan `dir` for `<time>.fields` files, sorted by time
///
/// Files with other extensions or unparsable names are skipped, as are
/// duplicates of the same time.
///
/// # Errors
/// Directory cannot be read
pub fn build_filename_map<P: AsRef<Path>>(dir: P) -> Result<Vec<(f64, PathBuf)>> {
    let mut map = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let time = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<f64>().ok());
        if let Some(time) = time {
            map.push((time, path));
        }
    }
    map.sort_by(|a, b| a.0.total_cmp(&b.0));
    map.dedup_by(|a, b| (a.0 - b.0).abs() <= tolerance(a.0));
    Ok(map)
}

/// Interpolated total flow in both representations
///
/// Boundary condition tags follow the perturbation variables.
#[derive(Clone)]
pub struct FlowTotals {
    /// Streamwise velocity
    pub u1: Field3,
    /// Spanwise velocity
    pub u2: Field3,
    /// Vertical velocity
    pub u3: Field3,
    /// Buoyancy
    pub b: Field3,
}

impl FlowTotals {
    /// Zero flow on `space`
    pub fn new(space: &Arc<Space3>) -> Self {
        Self {
            u1: Field3::new(space, Bc::Neumann),
            u2: Field3::new(space, Bc::Neumann),
            u3: Field3::new(space, Bc::Dirichlet),
            b: Field3::new(space, Bc::Neumann),
        }
    }

    /// Transform the nodal values to spectral space
    pub fn forward(&mut self) {
        self.u1.forward();
        self.u2.forward();
        self.u3.forward();
        self.b.forward();
    }

    /// (1 - w) a + w b
    fn blend(&mut self, lower: &Snapshot, upper: &Snapshot, w: f64) {
        for (out, (a, b)) in [&mut self.u1, &mut self.u2, &mut self.u3, &mut self.b]
            .iter_mut()
            .zip(lower.arrays().iter().zip(upper.arrays().iter()))
        {
            Zip::from(&mut out.v)
                .and(*a)
                .and(*b)
                .par_for_each(|o, &x, &y| *o = (1. - w) * x + w * y);
        }
        self.forward();
    }
}

/// Snapshots `index` and `index + 1` of a directory store
#[derive(Debug)]
struct Bracket {
    index: usize,
    lower: Snapshot,
    upper: Snapshot,
}

enum Source<'a> {
    Memory(&'a [Snapshot]),
    Files {
        paths: Vec<PathBuf>,
        shape: [usize; 3],
        cache: Option<Bracket>,
        loads: usize,
    },
}

/// Interpolator over a stored forward run
pub struct Trajectory<'a> {
    source: Source<'a>,
    times: Vec<f64>,
    direction: Direction,
    /// Lower index of the bracketing interval
    cursor: usize,
    last_query: Option<f64>,
}

impl<'a> Trajectory<'a> {
    /// Open `store` for queries moving in `direction`
    ///
    /// # Errors
    /// Fewer than two snapshots, or unreadable directory
    pub fn open(store: &'a SnapshotStore, direction: Direction) -> Result<Self> {
        let (times, source) = match store {
            SnapshotStore::Memory { times, snapshots } => {
                (times.clone(), Source::Memory(snapshots.as_slice()))
            }
            SnapshotStore::Directory { path, shape } => {
                let (times, paths): (Vec<f64>, Vec<PathBuf>) =
                    build_filename_map(path)?.into_iter().unzip();
                let source = Source::Files {
                    paths,
                    shape: *shape,
                    cache: None,
                    loads: 0,
                };
                (times, source)
            }
        };
        if times.len() < 2 {
            return Err(Error::TrajectoryEmpty);
        }
        let cursor = match direction {
            Direction::Forward => 0,
            Direction::Backward => times.len() - 2,
        };
        Ok(Self {
            source,
            times,
            direction,
            cursor,
            last_query: None,
        })
    }

    /// First and last stored time
    pub fn span(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    /// Playback direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of snapshot files read so far
    pub fn loads(&self) -> usize {
        match &self.source {
            Source::Memory(_) => 0,
            Source::Files { loads, .. } => *loads,
        }
    }

    /// Interpolate the total flow at `time` into `out`
    ///
    /// # Errors
    /// Time outside the stored interval, a query against the playback
    /// direction, or unreadable snapshot files
    pub fn interpolate(&mut self, time: f64, out: &mut FlowTotals) -> Result<()> {
        self.check(time)?;
        self.seek(time);
        self.last_query = Some(time);

        let (t0, t1) = (self.times[self.cursor], self.times[self.cursor + 1]);
        let w = ((time - t0) / (t1 - t0)).max(0.).min(1.);
        let index = self.cursor;
        let (lower, upper) = match &mut self.source {
            Source::Memory(snapshots) => (&snapshots[index], &snapshots[index + 1]),
            Source::Files {
                paths,
                shape,
                cache,
                loads,
            } => {
                *loads += load_bracket(paths, *shape, cache, index)?;
                match cache {
                    Some(bracket) => (&bracket.lower, &bracket.upper),
                    None => return Err(Error::TrajectoryEmpty),
                }
            }
        };
        out.blend(lower, upper, w);
        Ok(())
    }

    fn check(&self, time: f64) -> Result<()> {
        let (start, end) = self.span();
        let tol = tolerance(time);
        if time < start - tol || time > end + tol {
            return Err(Error::TrajectoryRange { time, start, end });
        }
        if let Some(previous) = self.last_query {
            let reversed = match self.direction {
                Direction::Forward => time < previous - tol,
                Direction::Backward => time > previous + tol,
            };
            if reversed {
                return Err(Error::TrajectoryDirection {
                    direction: self.direction,
                    previous,
                    requested: time,
                });
            }
        }
        Ok(())
    }

    fn seek(&mut self, time: f64) {
        let n = self.times.len();
        match self.direction {
            Direction::Forward => {
                while self.cursor + 2 < n && self.times[self.cursor + 1] < time {
                    self.cursor += 1;
                }
            }
            Direction::Backward => {
                while self.cursor > 0 && self.times[self.cursor] > time {
                    self.cursor -= 1;
                }
            }
        }
    }
}

/// Make `cache` hold snapshots `index` and `index + 1`, reusing the
/// cached neighbour. Returns the number of files read.
fn load_bracket(
    paths: &[PathBuf],
    shape: [usize; 3],
    cache: &mut Option<Bracket>,
    index: usize,
) -> Result<usize> {
    let (bracket, loads) = match cache.take() {
        Some(b) if b.index == index => (b, 0),
        Some(b) if b.index + 1 == index => {
            let upper = Snapshot::read(&paths[index + 1], shape)?;
            let bracket = Bracket {
                index,
                lower: b.upper,
                upper,
            };
            (bracket, 1)
        }
        Some(b) if index + 1 == b.index => {
            let lower = Snapshot::read(&paths[index], shape)?;
            let bracket = Bracket {
                index,
                lower,
                upper: b.lower,
            };
            (bracket, 1)
        }
        _ => {
            let bracket = Bracket {
                index,
                lower: Snapshot::read(&paths[index], shape)?,
                upper: Snapshot::read(&paths[index + 1], shape)?,
            };
            (bracket, 2)
        }
    };
    *cache = Some(bracket);
    Ok(loads)
}
