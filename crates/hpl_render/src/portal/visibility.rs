//! Sector visibility through portal chains
//!
//! A [`SectorVisibilityContainer`] is computed for one query volume, either a
//! camera frustum or a light's bounding volume. Starting from the sectors the
//! query originates in, it walks outward through every portal that faces the
//! origin, overlaps the query and is still visible through the portals that
//! led to it. Each step records a [`PortalVisibilitySet`]: the portals seen at
//! that depth together with the shadow volume each one casts away from the
//! origin. Objects in a reached sector are then tested against those chains.
//!
//! Sets live in a flat arena and refer to their parent by index.

use std::collections::HashMap;

use crate::foundation::collections::SectorId;
use crate::foundation::logging::{trace, warn};
use crate::foundation::math::Vec3;
use crate::portal::container::PortalContainer;
use crate::portal::portal::{Portal, PortalKey};
use crate::spatial::bounding_volume::BoundingVolume;
use crate::spatial::frustum::{Frustum, FrustumCollision};
use crate::spatial::shadow_volume::ShadowVolumeBv;

/// Extrusion distance of portal shadow volumes
pub const PORTAL_SHADOW_RANGE: f32 = 9999.0;

/// Volume visibility is computed for
#[derive(Debug, Clone)]
pub enum VisibilityQuery {
    /// Camera frustum, origin at the eye
    Frustum(Box<Frustum>),
    /// Light bounds, origin at the centre
    BoundingVolume(BoundingVolume),
}

impl VisibilityQuery {
    fn origin(&self) -> Vec3 {
        match self {
            Self::Frustum(frustum) => frustum.origin(),
            Self::BoundingVolume(bv) => bv.center(),
        }
    }

    fn overlaps(&self, bv: &BoundingVolume) -> bool {
        match self {
            Self::Frustum(frustum) => frustum.collide_bounding_volume(bv) != FrustumCollision::Outside,
            Self::BoundingVolume(query) => query.intersects(bv),
        }
    }
}

/// A portal seen from the origin and the volume it lets through
#[derive(Debug, Clone)]
pub struct PortalVisibility {
    portal: PortalKey,
    target: SectorId,
    shadow: Option<ShadowVolumeBv>,
}

impl PortalVisibility {
    /// Portal looked through
    pub const fn portal(&self) -> PortalKey {
        self.portal
    }

    /// Sector seen through the portal
    pub const fn target(&self) -> SectorId {
        self.target
    }

    /// Volume behind the portal as seen from the origin. `None` lets
    /// everything through.
    pub const fn shadow(&self) -> Option<&ShadowVolumeBv> {
        self.shadow.as_ref()
    }

    /// True if `bv` can be seen through this portal
    pub fn lets_through(&self, bv: &BoundingVolume) -> bool {
        self.shadow.as_ref().map_or(true, |shadow| shadow.collide_bounding_volume(bv))
    }
}

/// Portals found at one step of the walk
#[derive(Debug, Clone)]
pub struct PortalVisibilitySet {
    parent: Option<usize>,
    visibility: Vec<PortalVisibility>,
}

impl PortalVisibilitySet {
    /// Index of the set this one was reached through
    pub const fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Visible portals
    pub fn visibilities(&self) -> &[PortalVisibility] {
        &self.visibility
    }

    /// True if any portal of the set lets `bv` through
    pub fn lets_through(&self, bv: &BoundingVolume) -> bool {
        self.visibility.iter().any(|v| v.lets_through(bv))
    }
}

/// Reached sector and the sets leading into it
#[derive(Debug, Clone)]
pub struct SectorVisibility {
    sector: SectorId,
    start: bool,
    sets: Vec<usize>,
}

impl SectorVisibility {
    /// Sector id
    pub const fn sector(&self) -> SectorId {
        self.sector
    }

    /// True if the query originates in this sector
    pub const fn is_start(&self) -> bool {
        self.start
    }

    /// Indices of the sets the sector was reached through
    pub fn sets(&self) -> &[usize] {
        &self.sets
    }
}

/// Result of a portal walk for one query
#[derive(Debug, Clone)]
pub struct SectorVisibilityContainer {
    query: VisibilityQuery,
    origin: Vec3,
    sets: Vec<PortalVisibilitySet>,
    sectors: Vec<SectorVisibility>,
    index: HashMap<SectorId, usize>,
}

impl SectorVisibilityContainer {
    /// Visibility container for a camera frustum
    pub fn from_frustum(frustum: &Frustum) -> Self {
        Self::new(VisibilityQuery::Frustum(Box::new(frustum.clone())))
    }

    /// Visibility container for a bounding volume, usually a light's
    pub fn from_bounding_volume(bv: &BoundingVolume) -> Self {
        Self::new(VisibilityQuery::BoundingVolume(bv.clone()))
    }

    fn new(query: VisibilityQuery) -> Self {
        Self {
            origin: query.origin(),
            query,
            sets: Vec::new(),
            sectors: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Point portals must face
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Query volume
    pub const fn query(&self) -> &VisibilityQuery {
        &self.query
    }

    /// Walk the portal graph of `container`, replacing any previous result
    pub fn compute(&mut self, container: &PortalContainer) {
        self.sets.clear();
        self.sectors.clear();
        self.index.clear();

        let starts = self.start_sectors(container);
        for &sector in &starts {
            let (index, _) = self.get_or_create(sector);
            self.sectors[index].start = true;
        }
        for sector in starts {
            self.search_sector(container, sector, None, &[]);
        }
        trace!("Visibility computed: {} sectors, {} portal sets", self.sectors.len(), self.sets.len());
    }

    /// Reached sectors in discovery order
    pub fn sectors(&self) -> &[SectorVisibility] {
        &self.sectors
    }

    /// Visibility record of one sector
    pub fn sector_visibility(&self, sector: SectorId) -> Option<&SectorVisibility> {
        self.index.get(&sector).map(|&i| &self.sectors[i])
    }

    /// True if the sector was reached
    pub fn contains_sector(&self, sector: SectorId) -> bool {
        self.index.contains_key(&sector)
    }

    /// Ids of reached sectors in discovery order
    pub fn visible_sector_ids(&self) -> Vec<SectorId> {
        self.sectors.iter().map(SectorVisibility::sector).collect()
    }

    /// Portal set by index
    pub fn set(&self, index: usize) -> Option<&PortalVisibilitySet> {
        self.sets.get(index)
    }

    /// Number of recorded sets
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    /// True if `bv` is visible through at least one portal chain leading
    /// into the sector.
    ///
    /// Every level of the chain must have some portal letting the volume
    /// through. Start sectors have no chains and should not be tested.
    pub fn intersection_bv(&self, sector: &SectorVisibility, bv: &BoundingVolume) -> bool {
        if sector.sets.is_empty() {
            warn!("Sector {:?} has no portal sets to test against", sector.sector);
            return false;
        }
        sector.sets.iter().any(|&set| self.chain_lets_through(Some(set), bv))
    }

    fn chain_lets_through(&self, mut set: Option<usize>, bv: &BoundingVolume) -> bool {
        while let Some(index) = set {
            let current = &self.sets[index];
            if !current.lets_through(bv) {
                return false;
            }
            set = current.parent;
        }
        true
    }

    fn start_sectors(&self, container: &PortalContainer) -> Vec<SectorId> {
        match &self.query {
            VisibilityQuery::Frustum(frustum) => container
                .sectors()
                .filter(|(_, sector)| sector.bounding_volume().intersects(frustum.origin_bv()))
                .map(|(id, _)| id)
                .collect(),
            VisibilityQuery::BoundingVolume(_) => container
                .sectors()
                .find(|(_, sector)| sector.bounding_volume().contains_point(&self.origin))
                .map(|(id, _)| id)
                .into_iter()
                .collect(),
        }
    }

    fn get_or_create(&mut self, sector: SectorId) -> (usize, bool) {
        if let Some(&index) = self.index.get(&sector) {
            return (index, false);
        }
        let index = self.sectors.len();
        self.sectors.push(SectorVisibility { sector, start: false, sets: Vec::new() });
        self.index.insert(sector, index);
        (index, true)
    }

    fn candidate_portals(
        &self,
        container: &PortalContainer,
        sector: SectorId,
        parent: Option<usize>,
        via: &[usize],
    ) -> Vec<PortalKey> {
        let Some(set) = parent else {
            return container.sector(sector).map(|s| s.portal_keys(sector)).unwrap_or_default();
        };
        let mut keys = Vec::new();
        for &visibility in via {
            let key = self.sets[set].visibility[visibility].portal;
            let Some(portal) = container.portal(key) else {
                continue;
            };
            for through in container.through_portals(portal) {
                if !keys.contains(&through) {
                    keys.push(through);
                }
            }
        }
        keys
    }

    fn search_sector(&mut self, container: &PortalContainer, sector: SectorId, parent: Option<usize>, via: &[usize]) {
        let mut visible: Vec<(PortalKey, SectorId)> = Vec::new();
        for key in self.candidate_portals(container, sector, parent, via) {
            let Some(portal) = container.portal(key) else {
                continue;
            };
            let Some(target) = container.resolve_target(portal) else {
                continue;
            };
            // First path wins: a sector is never entered twice.
            if self.index.contains_key(&target) {
                continue;
            }
            if self.is_portal_visible(portal, parent) {
                visible.push((key, target));
            }
        }
        if visible.is_empty() {
            return;
        }

        let set_index = self.sets.len();
        let visibility = visible
            .iter()
            .map(|&(portal, target)| PortalVisibility {
                portal,
                target,
                shadow: container.portal(portal).and_then(|p| {
                    p.bounding_volume().get_shadow_volume(&self.origin, PORTAL_SHADOW_RANGE, true)
                }),
            })
            .collect();
        self.sets.push(PortalVisibilitySet { parent, visibility });

        let mut targets: Vec<SectorId> = Vec::new();
        for &(_, target) in &visible {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
        for target in targets {
            let (index, created) = self.get_or_create(target);
            if !created {
                continue;
            }
            self.sectors[index].sets.push(set_index);
            let via: Vec<usize> = visible
                .iter()
                .enumerate()
                .filter(|(_, (_, t))| *t == target)
                .map(|(i, _)| i)
                .collect();
            self.search_sector(container, target, Some(set_index), &via);
        }
    }

    fn is_portal_visible(&self, portal: &Portal, parent: Option<usize>) -> bool {
        if !portal.is_active() {
            return false;
        }
        if !portal.is_facing(&self.origin) {
            return false;
        }
        if !self.query.overlaps(portal.bounding_volume()) {
            return false;
        }
        self.chain_lets_through(parent, portal.bounding_volume())
    }
}
