//! Axis-aligned bounding volumes with lazily reprojected world extents
//!
//! A [`BoundingVolume`] stores a local box plus the transform that places it
//! in the world. World extents are recomputed from the eight transformed
//! corners only when they are queried after the transform or local size
//! changed. The shadow volume cast by the box from a point light is cached the
//! same way.

use std::cell::{Cell, RefCell};

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};
use crate::spatial::shadow_volume::ShadowVolumeBv;

/// World-space extents derived from a [`BoundingVolume`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldExtents {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
    /// Box centre
    pub center: Vec3,
    /// Radius of the enclosing sphere
    pub radius: f32,
}

#[derive(Debug, Clone)]
struct ShadowCache {
    light_position: Vec3,
    range: f32,
    volume: Option<ShadowVolumeBv>,
}

/// Axis-aligned bounding box with local extents and a world transform
#[derive(Debug, Clone)]
pub struct BoundingVolume {
    local_min: Vec3,
    local_max: Vec3,
    transform: Mat4,
    world: Cell<Option<WorldExtents>>,
    shadow: RefCell<Option<ShadowCache>>,
}

impl Default for BoundingVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundingVolume {
    /// Create an empty volume at the origin
    pub fn new() -> Self {
        Self::from_min_max(Vec3::zeros(), Vec3::zeros())
    }

    /// Create a volume from local extents with an identity transform
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            local_min: min,
            local_max: max,
            transform: Mat4::identity(),
            world: Cell::new(None),
            shadow: RefCell::new(None),
        }
    }

    /// Create a volume centred on `center` with half extents `half_size`
    pub fn from_center_extents(center: Vec3, half_size: Vec3) -> Self {
        Self::from_min_max(center - half_size, center + half_size)
    }

    fn invalidate(&self) {
        self.world.set(None);
        self.shadow.replace(None);
    }

    /// Set local extents
    pub fn set_local_min_max(&mut self, min: Vec3, max: Vec3) {
        self.local_min = min;
        self.local_max = max;
        self.invalidate();
    }

    /// Set the world transform
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
        self.invalidate();
    }

    /// Set the world transform to a pure translation
    pub fn set_position(&mut self, position: Vec3) {
        self.set_transform(Mat4::new_translation(&position));
    }

    /// World transform
    pub const fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Local minimum corner
    pub const fn local_min(&self) -> Vec3 {
        self.local_min
    }

    /// Local maximum corner
    pub const fn local_max(&self) -> Vec3 {
        self.local_max
    }

    /// World extents, recomputed only if the volume changed since the last query
    pub fn world(&self) -> WorldExtents {
        if let Some(extents) = self.world.get() {
            return extents;
        }

        let mut min = Vec3::repeat(f32::MAX);
        let mut max = Vec3::repeat(f32::MIN);
        for corner in utils::box_corners(&self.local_min, &self.local_max) {
            let world = self.transform.transform_position(&corner);
            min = min.inf(&world);
            max = max.sup(&world);
        }
        let center = (min + max) * 0.5;
        let extents = WorldExtents {
            min,
            max,
            center,
            radius: (max - center).norm(),
        };
        self.world.set(Some(extents));
        extents
    }

    /// World minimum corner
    pub fn min(&self) -> Vec3 {
        self.world().min
    }

    /// World maximum corner
    pub fn max(&self) -> Vec3 {
        self.world().max
    }

    /// World centre
    pub fn center(&self) -> Vec3 {
        self.world().center
    }

    /// Radius of the enclosing sphere
    pub fn radius(&self) -> f32 {
        self.world().radius
    }

    /// World size
    pub fn size(&self) -> Vec3 {
        let extents = self.world();
        extents.max - extents.min
    }

    /// The eight world corners (see [`utils::box_corners`] for ordering)
    pub fn corners(&self) -> [Vec3; 8] {
        let extents = self.world();
        utils::box_corners(&extents.min, &extents.max)
    }

    /// Grow the local box so the world box of `other` is enclosed.
    ///
    /// Intended for volumes with an identity transform, such as sector bounds.
    pub fn add_volume(&mut self, other: &Self) {
        let extents = other.world();
        self.add_box(&extents.min, &extents.max);
    }

    /// Grow the local box to enclose `[min, max]`
    pub fn add_box(&mut self, min: &Vec3, max: &Vec3) {
        let (lo, hi) = (self.local_min.inf(min), self.local_max.sup(max));
        self.set_local_min_max(lo, hi);
    }

    /// Inclusive point containment
    pub fn contains_point(&self, point: &Vec3) -> bool {
        let extents = self.world();
        utils::point_in_box(point, &extents.min, &extents.max)
    }

    /// Inclusive box overlap
    pub fn intersects(&self, other: &Self) -> bool {
        let a = self.world();
        let b = other.world();
        utils::boxes_overlap(&a.min, &a.max, &b.min, &b.max)
    }

    /// True if `other` lies completely inside this volume
    pub fn contains(&self, other: &Self) -> bool {
        let b = other.world();
        self.contains_point(&b.min) && self.contains_point(&b.max)
    }

    /// Shadow volume cast by this box from a point light.
    ///
    /// Returns `None` when the light is inside the box. The result is cached
    /// per light position and range until the box moves; `force_update`
    /// bypasses the cache.
    pub fn get_shadow_volume(
        &self,
        light_position: &Vec3,
        light_range: f32,
        force_update: bool,
    ) -> Option<ShadowVolumeBv> {
        if !force_update {
            if let Some(cache) = self.shadow.borrow().as_ref() {
                if cache.light_position == *light_position && cache.range == light_range {
                    return cache.volume.clone();
                }
            }
        }

        let extents = self.world();
        let volume = ShadowVolumeBv::from_box(&extents.min, &extents.max, light_position, light_range);
        self.shadow.replace(Some(ShadowCache {
            light_position: *light_position,
            range: light_range,
            volume: volume.clone(),
        }));
        volume
    }
}
