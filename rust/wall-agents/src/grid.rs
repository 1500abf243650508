// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary raster and the occupancy maps the agents share.
//!
//! The [`World`] owns the immutable food/wall [`Grid`] plus three parallel
//! [`OccupancyMap`]s. Claiming cells in those maps is the only way agents
//! tell each other what they own; there is no message passing.
//!
//! Every query outside the grid fails closed: the cell is not food and it is
//! treated as claimed.

use crate::error::{Error, Result};
use crate::types::{AgentId, Cell};

/// 8-neighbourhood offsets in scan order.
const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Immutable binary raster: `true` = food, `false` = wall.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    food: Vec<bool>,
}

impl Grid {
    /// Builds a grid from rows of `{0, 1}` values (1 = food).
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid);
        }

        let mut food = Vec::with_capacity(width * height);
        for (row_index, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != width {
                return Err(Error::RaggedGrid {
                    row: row_index,
                    expected: width,
                    found: row.len(),
                });
            }
            food.extend(row.iter().map(|&v| v != 0));
        }

        Ok(Self {
            width,
            height,
            food,
        })
    }

    /// Builds a grid by evaluating `is_food` at every cell.
    pub fn from_fn(width: usize, height: usize, is_food: impl Fn(i32, i32) -> bool) -> Self {
        let mut food = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                food.push(is_food(x as i32, y as i32));
            }
        }
        Self {
            width,
            height,
            food,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| cell.y as usize * self.width + cell.x as usize)
    }

    pub fn is_food(&self, cell: Cell) -> bool {
        self.index(cell).map(|i| self.food[i]).unwrap_or(false)
    }

    /// Number of food cells.
    pub fn food_count(&self) -> usize {
        self.food.iter().filter(|&&f| f).count()
    }

    /// Cell at a linear raster index.
    pub fn cell_at(&self, index: usize) -> Cell {
        Cell::new((index % self.width) as i32, (index / self.width) as i32)
    }

    pub fn len(&self) -> usize {
        self.food.len()
    }

    pub fn is_empty(&self) -> bool {
        self.food.is_empty()
    }
}

/// Owner-per-cell map; 0 means free.
#[derive(Debug, Clone)]
pub struct OccupancyMap {
    width: usize,
    height: usize,
    owners: Vec<u32>,
}

impl OccupancyMap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            owners: vec![0; width * height],
        }
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        (cell.x >= 0
            && cell.y >= 0
            && (cell.x as usize) < self.width
            && (cell.y as usize) < self.height)
            .then(|| cell.y as usize * self.width + cell.x as usize)
    }

    /// Current owner, `None` when free or out of bounds.
    pub fn owner(&self, cell: Cell) -> Option<AgentId> {
        self.index(cell)
            .and_then(|i| AgentId::from_raw(self.owners[i]))
    }

    /// Out-of-bounds cells count as claimed.
    pub fn is_claimed(&self, cell: Cell) -> bool {
        match self.index(cell) {
            Some(i) => self.owners[i] != 0,
            None => true,
        }
    }

    /// Claims a free in-bounds cell. Returns `false` if it was taken.
    pub fn claim(&mut self, cell: Cell, owner: AgentId) -> bool {
        match self.index(cell) {
            Some(i) if self.owners[i] == 0 => {
                self.owners[i] = owner.get();
                true
            }
            _ => false,
        }
    }

    /// Releases a cell, but only for its recorded owner.
    pub fn release(&mut self, cell: Cell, owner: AgentId) -> bool {
        match self.index(cell) {
            Some(i) if self.owners[i] == owner.get() => {
                self.owners[i] = 0;
                true
            }
            _ => false,
        }
    }

    /// Takes ownership regardless of the current owner, returning the previous one.
    pub fn force_claim(&mut self, cell: Cell, owner: AgentId) -> Option<AgentId> {
        let i = self.index(cell)?;
        let previous = AgentId::from_raw(self.owners[i]);
        self.owners[i] = owner.get();
        previous
    }

    /// Number of cells held by `owner`.
    pub fn count_owned_by(&self, owner: AgentId) -> usize {
        self.owners.iter().filter(|&&o| o == owner.get()).count()
    }
}

/// The raster plus the occupancy maps of every agent kind.
#[derive(Debug, Clone)]
pub struct World {
    grid: Grid,
    occupied: OccupancyMap,
    occupied_wall: OccupancyMap,
    blob_grid: OccupancyMap,
}

impl World {
    pub fn new(grid: Grid) -> Self {
        let (w, h) = (grid.width(), grid.height());
        Self {
            grid,
            occupied: OccupancyMap::new(w, h),
            occupied_wall: OccupancyMap::new(w, h),
            blob_grid: OccupancyMap::new(w, h),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        self.grid.in_bounds(cell)
    }

    pub fn is_food(&self, cell: Cell) -> bool {
        self.grid.is_food(cell)
    }

    /// Claimed by a Mushroom (out of bounds counts as occupied).
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.occupied.is_claimed(cell)
    }

    /// Claims a food cell for a Mushroom.
    pub fn occupy(&mut self, cell: Cell, owner: AgentId) -> bool {
        self.grid.is_food(cell) && self.occupied.claim(cell, owner)
    }

    pub fn free(&mut self, cell: Cell, owner: AgentId) -> bool {
        self.occupied.release(cell, owner)
    }

    /// Takes a food cell from whichever Mushroom holds it.
    pub fn force_occupy(&mut self, cell: Cell, owner: AgentId) -> Option<AgentId> {
        if !self.grid.is_food(cell) {
            return None;
        }
        self.occupied.force_claim(cell, owner)
    }

    /// In-bounds 8-neighbours of a cell.
    pub fn get_neighbors_8(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        NEIGHBORS_8
            .iter()
            .map(move |&(dx, dy)| Cell::new(cell.x + dx, cell.y + dy))
            .filter(move |&c| self.grid.in_bounds(c))
    }

    pub fn occupied(&self) -> &OccupancyMap {
        &self.occupied
    }

    pub fn occupied_mut(&mut self) -> &mut OccupancyMap {
        &mut self.occupied
    }

    pub fn occupied_wall(&self) -> &OccupancyMap {
        &self.occupied_wall
    }

    pub fn occupied_wall_mut(&mut self) -> &mut OccupancyMap {
        &mut self.occupied_wall
    }

    pub fn blob_grid(&self) -> &OccupancyMap {
        &self.blob_grid
    }

    pub fn blob_grid_mut(&mut self) -> &mut OccupancyMap {
        &mut self.blob_grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IdGenerator;

    #[test]
    fn test_from_rows() {
        let grid = Grid::from_rows(&[vec![0u8, 1, 1], vec![1, 0, 0]]).unwrap();
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert!(grid.is_food(Cell::new(1, 0)));
        assert!(!grid.is_food(Cell::new(1, 1)));
        assert_eq!(grid.food_count(), 3);
    }

    #[test]
    fn test_from_rows_rejects_bad_input() {
        let empty: [Vec<u8>; 0] = [];
        assert!(matches!(Grid::from_rows(&empty), Err(Error::EmptyGrid)));
        assert!(matches!(
            Grid::from_rows(&[vec![1u8, 1], vec![1]]),
            Err(Error::RaggedGrid { row: 1, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_out_of_bounds_fails_closed() {
        let world = World::new(Grid::from_fn(4, 4, |_, _| true));
        assert!(!world.is_food(Cell::new(-1, 0)));
        assert!(!world.is_food(Cell::new(0, 4)));
        assert!(world.is_occupied(Cell::new(4, 0)));
        assert!(!world.is_occupied(Cell::new(3, 3)));
        assert!(world.blob_grid().is_claimed(Cell::new(0, -1)));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let mut ids = IdGenerator::new();
        let (a, b) = (ids.next_id(), ids.next_id());
        let mut world = World::new(Grid::from_fn(4, 4, |x, _| x < 2));
        let cell = Cell::new(1, 1);

        assert!(world.occupy(cell, a));
        assert!(!world.occupy(cell, b));
        assert!(!world.free(cell, b));
        assert_eq!(world.occupied().owner(cell), Some(a));
        assert!(world.free(cell, a));
        assert!(!world.is_occupied(cell));

        // walls are never claimed by mushrooms
        assert!(!world.occupy(Cell::new(3, 1), a));
    }

    #[test]
    fn test_force_claim_returns_previous_owner() {
        let mut ids = IdGenerator::new();
        let (a, b) = (ids.next_id(), ids.next_id());
        let mut map = OccupancyMap::new(3, 3);
        assert!(map.claim(Cell::new(0, 0), a));
        assert_eq!(map.force_claim(Cell::new(0, 0), b), Some(a));
        assert_eq!(map.owner(Cell::new(0, 0)), Some(b));
        assert_eq!(map.force_claim(Cell::new(5, 5), b), None);
        assert_eq!(map.count_owned_by(b), 1);
    }

    #[test]
    fn test_force_occupy_skips_walls() {
        let mut ids = IdGenerator::new();
        let (a, b) = (ids.next_id(), ids.next_id());
        let mut world = World::new(Grid::from_fn(4, 4, |x, _| x < 2));
        assert!(world.occupy(Cell::new(0, 0), a));
        assert_eq!(world.force_occupy(Cell::new(0, 0), b), Some(a));
        assert_eq!(world.occupied().owner(Cell::new(0, 0)), Some(b));
        assert_eq!(world.force_occupy(Cell::new(3, 0), b), None);
        assert!(!world.is_occupied(Cell::new(3, 0)));
    }

    #[test]
    fn test_neighbors_8_clip_to_bounds() {
        let world = World::new(Grid::from_fn(3, 3, |_, _| true));
        assert_eq!(world.get_neighbors_8(Cell::new(1, 1)).count(), 8);
        assert_eq!(world.get_neighbors_8(Cell::new(0, 0)).count(), 3);
        assert_eq!(world.get_neighbors_8(Cell::new(2, 1)).count(), 5);
    }
}
