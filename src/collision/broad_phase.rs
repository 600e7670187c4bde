use std::collections::HashMap;
use crate::math::{Vec2, Aabb, RayCastInput};

/// Index of a proxy inside the broadphase
pub type ProxyId = usize;

/// Proxies spanning more cells than this are kept in a separate list and
/// tested against every query.
const MAX_CELLS_PER_PROXY: i64 = 64;

#[derive(Debug, Clone)]
struct Proxy<T> {
    /// Fattened bounds
    aabb: Aabb,

    user_data: T,

    /// Inclusive cell range, `None` for large proxies
    cells: Option<CellRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min: (i32, i32),
    max: (i32, i32),
}

impl CellRange {
    fn cell_count(&self) -> i64 {
        (i64::from(self.max.0) - i64::from(self.min.0) + 1) * (i64::from(self.max.1) - i64::from(self.min.1) + 1)
    }

    fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (self.min.0..=self.max.0).flat_map(move |x| (self.min.1..=self.max.1).map(move |y| (x, y)))
    }
}

/// Spatial hashing broadphase over fattened AABBs.
///
/// Proxies are hashed into a uniform grid. Moved proxies are buffered and
/// `update_pairs` reports every new overlap involving a moved proxy, sorted
/// and without duplicates, so that results do not depend on hash order.
#[derive(Debug, Clone)]
pub struct BroadPhase<T> {
    proxies: Vec<Option<Proxy<T>>>,
    free: Vec<ProxyId>,
    cells: HashMap<(i32, i32), Vec<ProxyId>>,
    large: Vec<ProxyId>,
    cell_size: f32,
    extension: f32,
    multiplier: f32,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
    proxy_count: usize,
}

impl<T: Copy> BroadPhase<T> {
    /// Creates a new broadphase
    pub fn new(cell_size: f32, extension: f32, multiplier: f32) -> Self {
        Self {
            proxies: Vec::new(),
            free: Vec::new(),
            cells: HashMap::new(),
            large: Vec::new(),
            cell_size,
            extension,
            multiplier,
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
            proxy_count: 0,
        }
    }

    /// Creates a proxy with a fattened copy of `aabb`. The proxy reports
    /// pairs on the next `update_pairs`.
    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: T) -> ProxyId {
        let fat = aabb.expand(self.extension);
        let proxy = Proxy { aabb: fat, user_data, cells: None };

        let id = match self.free.pop() {
            Some(id) => {
                self.proxies[id] = Some(proxy);
                id
            }
            None => {
                self.proxies.push(Some(proxy));
                self.proxies.len() - 1
            }
        };

        self.insert_into_grid(id);
        self.proxy_count += 1;
        self.buffer_move(id);
        id
    }

    /// Destroys a proxy
    pub fn destroy_proxy(&mut self, id: ProxyId) {
        self.unbuffer_move(id);
        self.remove_from_grid(id);
        if let Some(slot) = self.proxies.get_mut(id) {
            if slot.take().is_some() {
                self.free.push(id);
                self.proxy_count -= 1;
            }
        }
    }

    /// Moves a proxy. Nothing happens while the tight `aabb` stays inside
    /// the fat bounds; otherwise the fat bounds are rebuilt, stretched along
    /// `displacement`, and the proxy is buffered for pair finding.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: &Aabb, displacement: Vec2) -> bool {
        let Some(Some(proxy)) = self.proxies.get(id) else {
            return false;
        };
        if proxy.aabb.contains(aabb) {
            return false;
        }

        self.remove_from_grid(id);

        // Extend AABB
        let mut fat = aabb.expand(self.extension);

        // Predict AABB displacement
        let d = displacement * self.multiplier;
        if d.x < 0.0 {
            fat.lower.x += d.x;
        } else {
            fat.upper.x += d.x;
        }
        if d.y < 0.0 {
            fat.lower.y += d.y;
        } else {
            fat.upper.y += d.y;
        }

        if let Some(Some(proxy)) = self.proxies.get_mut(id) {
            proxy.aabb = fat;
        }
        self.insert_into_grid(id);
        self.buffer_move(id);
        true
    }

    /// Forces a proxy to report its pairs on the next `update_pairs`
    pub fn touch_proxy(&mut self, id: ProxyId) {
        self.buffer_move(id);
    }

    /// Returns the fat AABB of a proxy
    pub fn fat_aabb(&self, id: ProxyId) -> Option<Aabb> {
        self.proxy(id).map(|p| p.aabb)
    }

    /// Returns the user data of a proxy
    pub fn user_data(&self, id: ProxyId) -> Option<T> {
        self.proxy(id).map(|p| p.user_data)
    }

    /// Tests the fat AABBs of two proxies for overlap
    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        match (self.proxy(a), self.proxy(b)) {
            (Some(pa), Some(pb)) => pa.aabb.overlaps(&pb.aabb),
            _ => false,
        }
    }

    /// Number of live proxies
    pub fn proxy_count(&self) -> usize {
        self.proxy_count
    }

    /// Reports every overlapping pair that involves a moved proxy, then
    /// clears the move buffer.
    pub fn update_pairs<F>(&mut self, mut callback: F)
    where
        F: FnMut(T, T),
    {
        self.pair_buffer.clear();

        let moved = std::mem::take(&mut self.move_buffer);
        let mut candidates = Vec::new();
        for &query_id in &moved {
            let Some(fat) = self.fat_aabb(query_id) else {
                continue;
            };

            candidates.clear();
            self.collect_candidates(&fat, &mut candidates);
            for &other in &candidates {
                // A proxy cannot form a pair with itself
                if other == query_id {
                    continue;
                }
                if self.test_overlap(query_id, other) {
                    self.pair_buffer.push((query_id.min(other), query_id.max(other)));
                }
            }
        }

        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        for &(a, b) in &self.pair_buffer {
            if let (Some(data_a), Some(data_b)) = (self.user_data(a), self.user_data(b)) {
                callback(data_a, data_b);
            }
        }
    }

    /// Reports every proxy whose fat AABB overlaps `aabb`, in proxy order.
    /// The callback returns `false` to stop the query.
    pub fn query<F>(&self, aabb: &Aabb, mut callback: F)
    where
        F: FnMut(ProxyId) -> bool,
    {
        let mut candidates = Vec::new();
        self.collect_candidates(aabb, &mut candidates);
        for id in candidates {
            let overlaps = self.proxy(id).map_or(false, |p| p.aabb.overlaps(aabb));
            if overlaps && !callback(id) {
                return;
            }
        }
    }

    /// Casts a segment against the fat AABBs of every proxy, in proxy order.
    /// The callback returns the new maximum fraction: 0 terminates the cast
    /// and a negative value leaves the segment unchanged.
    pub fn ray_cast<F>(&self, input: &RayCastInput, mut callback: F)
    where
        F: FnMut(&RayCastInput, ProxyId) -> f32,
    {
        let mut sub_input = *input;
        for (id, proxy) in self.proxies.iter().enumerate() {
            let Some(proxy) = proxy else {
                continue;
            };

            let segment_end = sub_input.point_at(sub_input.max_fraction);
            let segment_aabb = Aabb::new(sub_input.p1.min(&segment_end), sub_input.p1.max(&segment_end));
            if !segment_aabb.overlaps(&proxy.aabb) {
                continue;
            }

            let starts_inside = proxy.aabb.contains_point(sub_input.p1);
            if !starts_inside && proxy.aabb.ray_cast(&sub_input).is_none() {
                continue;
            }

            let value = callback(&sub_input, id);
            if value == 0.0 {
                // The client has terminated the ray cast
                return;
            }
            if value > 0.0 {
                sub_input.max_fraction = value;
            }
        }
    }

    /// Translates every proxy by `-new_origin` and rebuilds the grid
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.cells.clear();
        self.large.clear();
        for id in 0..self.proxies.len() {
            if let Some(Some(proxy)) = self.proxies.get_mut(id) {
                proxy.aabb.translate(-new_origin);
                proxy.cells = None;
                self.insert_into_grid(id);
            }
        }
    }

    fn proxy(&self, id: ProxyId) -> Option<&Proxy<T>> {
        self.proxies.get(id).and_then(|p| p.as_ref())
    }

    fn buffer_move(&mut self, id: ProxyId) {
        if !self.move_buffer.contains(&id) {
            self.move_buffer.push(id);
        }
    }

    fn unbuffer_move(&mut self, id: ProxyId) {
        self.move_buffer.retain(|&m| m != id);
    }

    fn cell_index(&self, p: Vec2) -> (i32, i32) {
        (
            (p.x / self.cell_size).floor() as i32,
            (p.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_range(&self, aabb: &Aabb) -> CellRange {
        CellRange {
            min: self.cell_index(aabb.lower),
            max: self.cell_index(aabb.upper),
        }
    }

    fn insert_into_grid(&mut self, id: ProxyId) {
        let Some(aabb) = self.fat_aabb(id) else {
            return;
        };
        let range = self.cell_range(&aabb);

        if range.cell_count() > MAX_CELLS_PER_PROXY {
            self.large.push(id);
            return;
        }

        for cell in range.cells() {
            self.cells.entry(cell).or_default().push(id);
        }
        if let Some(Some(proxy)) = self.proxies.get_mut(id) {
            proxy.cells = Some(range);
        }
    }

    fn remove_from_grid(&mut self, id: ProxyId) {
        let range = match self.proxy(id) {
            Some(proxy) => proxy.cells,
            None => return,
        };

        match range {
            Some(range) => {
                for cell in range.cells() {
                    if let Some(bucket) = self.cells.get_mut(&cell) {
                        bucket.retain(|&p| p != id);
                        if bucket.is_empty() {
                            self.cells.remove(&cell);
                        }
                    }
                }
            }
            None => self.large.retain(|&p| p != id),
        }

        if let Some(Some(proxy)) = self.proxies.get_mut(id) {
            proxy.cells = None;
        }
    }

    /// Collects the sorted, unique ids of proxies sharing a cell with `aabb`
    fn collect_candidates(&self, aabb: &Aabb, out: &mut Vec<ProxyId>) {
        let range = self.cell_range(aabb);

        if range.cell_count() > MAX_CELLS_PER_PROXY {
            // Cheaper to scan every proxy than to walk a huge cell range
            out.extend(
                self.proxies
                    .iter()
                    .enumerate()
                    .filter_map(|(id, p)| p.as_ref().map(|_| id)),
            );
        } else {
            for cell in range.cells() {
                if let Some(bucket) = self.cells.get(&cell) {
                    out.extend_from_slice(bucket);
                }
            }
            out.extend_from_slice(&self.large);
        }

        out.sort_unstable();
        out.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(center: Vec2, half: f32) -> Aabb {
        Aabb::from_center_half_extents(center, Vec2::new(half, half))
    }

    #[test]
    fn reports_each_new_pair_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::new(1.0, 0.1, 2.0);
        bp.create_proxy(&square(Vec2::zero(), 0.5), 1);
        bp.create_proxy(&square(Vec2::new(0.8, 0.0), 0.5), 2);
        bp.create_proxy(&square(Vec2::new(10.0, 0.0), 0.5), 3);

        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert_eq!(pairs, vec![(1, 2)]);

        // Nothing moved, nothing reported
        pairs.clear();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn small_moves_stay_inside_fat_bounds() {
        let mut bp: BroadPhase<u32> = BroadPhase::new(1.0, 0.1, 2.0);
        let id = bp.create_proxy(&square(Vec2::zero(), 0.5), 1);
        assert!(!bp.move_proxy(id, &square(Vec2::new(0.05, 0.0), 0.5), Vec2::new(0.05, 0.0)));
        assert!(bp.move_proxy(id, &square(Vec2::new(0.5, 0.0), 0.5), Vec2::new(0.5, 0.0)));

        let fat = bp.fat_aabb(id).unwrap();
        assert!(fat.upper.x >= 1.0 + 0.1 + 1.0 - 1e-5);
    }

    #[test]
    fn large_proxies_are_found_by_queries() {
        let mut bp: BroadPhase<u32> = BroadPhase::new(1.0, 0.1, 2.0);
        let ground = bp.create_proxy(&Aabb::new(Vec2::new(-100.0, -1.0), Vec2::new(100.0, 0.0)), 7);

        let mut found = Vec::new();
        bp.query(&square(Vec2::new(42.0, 0.0), 0.2), |id| {
            found.push(id);
            true
        });
        assert_eq!(found, vec![ground]);
    }
}
