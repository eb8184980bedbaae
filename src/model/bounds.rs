use crate::model::vector3::Vector3;
use ord_subset::OrdSubsetIterExt;
use serde::{Deserialize, Serialize};

/// Axis aligned box. `l*` is the lower corner, `u*` the upper one.
///
/// Serialized as `[minx, miny, minz, maxx, maxy, maxz]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct Bounds {
    pub size_x: f64,
    pub size_y: f64,
    pub size_z: f64,
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
}

impl Bounds {
    pub fn new(ux: f64, uy: f64, uz: f64, lx: f64, ly: f64, lz: f64) -> Bounds {
        Bounds {
            size_x: (lx - ux).abs(),
            size_y: (ly - uy).abs(),
            size_z: (lz - uz).abs(),
            ux,
            uy,
            uz,
            lx,
            ly,
            lz,
        }
    }

    pub fn min(&self) -> Vector3 {
        Vector3::new(self.lx, self.ly, self.lz)
    }

    pub fn max(&self) -> Vector3 {
        Vector3::new(self.ux, self.uy, self.uz)
    }

    pub fn mid(&self) -> Vector3 {
        Vector3::new(
            (self.lx + self.ux) / 2.0,
            (self.ly + self.uy) / 2.0,
            (self.lz + self.uz) / 2.0,
        )
    }

    pub fn height(&self) -> f64 {
        self.size_z
    }

    /// Grows the box to a cube anchored at its lower corner.
    pub fn cubic(&self) -> Bounds {
        let max_size = [self.size_x, self.size_y, self.size_z]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let new_ux = self.lx + max_size;
        let new_uy = self.ly + max_size;
        let new_uz = self.lz + max_size;
        Bounds::new(new_ux, new_uy, new_uz, self.lx, self.ly, self.lz)
    }

    pub fn contains(&self, point: &Vector3) -> bool {
        point.x >= self.lx
            && point.x <= self.ux
            && point.y >= self.ly
            && point.y <= self.uy
            && point.z >= self.lz
            && point.z <= self.uz
    }

    /// Octant of `point`: bit 2 is set for the upper x half, bit 1 for y and
    /// bit 0 for z.
    pub fn octant_of(&self, point: &Vector3) -> usize {
        let mid = self.mid();
        let mut index = 0;
        if point.x >= mid.x {
            index |= 0b100;
        }
        if point.y >= mid.y {
            index |= 0b010;
        }
        if point.z >= mid.z {
            index |= 0b001;
        }
        index
    }

    pub fn get_octant(&self, index: usize) -> Bounds {
        let mid = self.mid();
        let (lx, ux) = if (index & 0b100) == 0 {
            (self.lx, mid.x)
        } else {
            (mid.x, self.ux)
        };
        let (ly, uy) = if (index & 0b010) == 0 {
            (self.ly, mid.y)
        } else {
            (mid.y, self.uy)
        };
        let (lz, uz) = if (index & 0b001) == 0 {
            (self.lz, mid.z)
        } else {
            (mid.z, self.uz)
        };
        Bounds::new(ux, uy, uz, lx, ly, lz)
    }

    /// Slice `index` of `count` equal slices along z. x and y are untouched.
    pub fn slice_z(&self, count: usize, index: usize) -> Bounds {
        let step = self.height() / count as f64;
        Bounds::new(
            self.ux,
            self.uy,
            self.lz + step * (index as f64 + 1.0),
            self.lx,
            self.ly,
            self.lz + step * index as f64,
        )
    }
}

impl From<[f64; 6]> for Bounds {
    fn from(v: [f64; 6]) -> Bounds {
        Bounds::new(v[3], v[4], v[5], v[0], v[1], v[2])
    }
}

impl From<Bounds> for [f64; 6] {
    fn from(b: Bounds) -> [f64; 6] {
        [b.lx, b.ly, b.lz, b.ux, b.uy, b.uz]
    }
}

pub fn find_bounds(points: &[Vector3]) -> Option<Bounds> {
    if points.is_empty() {
        return None;
    }
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
    let zs: Vec<f64> = points.iter().map(|p| p.z).collect();

    Some(Bounds::new(
        *xs.iter().ord_subset_max()?,
        *ys.iter().ord_subset_max()?,
        *zs.iter().ord_subset_max()?,
        *xs.iter().ord_subset_min()?,
        *ys.iter().ord_subset_min()?,
        *zs.iter().ord_subset_min()?,
    ))
}
