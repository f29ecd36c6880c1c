//! Authored room data and the read-only catalog that serves it.

mod layouts;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

pub(crate) const TILE_SIZE: f32 = 16.0;
pub(crate) const MAX_SUPPORTED_ROOMS: usize = 50;
pub(crate) const START_SPAWN: &str = "start";
pub(crate) const INITIAL_ROOM: &str = "room_01";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cell {
    Empty,
    Solid,
}

/// Row-major grid, row 0 at the top of the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CollisionGrid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl CollisionGrid {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width as usize * height as usize],
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn cell(&self, x: u32, y: u32) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Out-of-range writes are ignored.
    pub(crate) fn set(&mut self, x: u32, y: u32, cell: Cell) {
        if x >= self.width || y >= self.height {
            return;
        }
        let index = y as usize * self.width as usize + x as usize;
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
        }
    }

    pub(crate) fn is_solid(&self, x: u32, y: u32) -> bool {
        self.cell(x, y) == Some(Cell::Solid)
    }

    /// Solid floor across the bottom `rows` rows.
    pub(crate) fn fill_ground(&mut self, rows: u32) {
        let first = self.height.saturating_sub(rows);
        for y in first..self.height {
            for x in 0..self.width {
                self.set(x, y, Cell::Solid);
            }
        }
    }

    /// Horizontal run on row `y` from `x0` to `x1` inclusive.
    pub(crate) fn add_platform(&mut self, y: u32, x0: u32, x1: u32) {
        for x in x0..=x1 {
            self.set(x, y, Cell::Solid);
        }
    }

    /// Vertical run on column `x` from `y0` to `y1` inclusive.
    pub(crate) fn add_wall(&mut self, x: u32, y0: u32, y1: u32) {
        for y in y0..=y1 {
            self.set(x, y, Cell::Solid);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TilePos {
    pub(crate) x: u32,
    pub(crate) y: u32,
}

impl TilePos {
    pub(crate) const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Pixel centre of a tile.
pub(crate) fn tile_to_pixel(tile: TilePos) -> (f32, f32) {
    (
        tile.x as f32 * TILE_SIZE + TILE_SIZE / 2.0,
        tile.y as f32 * TILE_SIZE + TILE_SIZE / 2.0,
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DoorDef {
    pub(crate) id: String,
    pub(crate) tile: TilePos,
    pub(crate) tile_width: u32,
    pub(crate) tile_height: u32,
    pub(crate) target_room: String,
    pub(crate) target_spawn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemKind {
    DashModule,
    MissilePack,
    SuperPack,
    SuitUpgrade,
}

impl ItemKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ItemKind::DashModule => "dash_module",
            ItemKind::MissilePack => "missile_pack",
            ItemKind::SuperPack => "super_pack",
            ItemKind::SuitUpgrade => "suit_upgrade",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemSpawn {
    pub(crate) id: String,
    pub(crate) kind: ItemKind,
    pub(crate) tile: TilePos,
    pub(crate) amount: Option<u32>,
    pub(crate) level: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnemySpawn {
    pub(crate) id: String,
    pub(crate) archetype: String,
    pub(crate) tile: TilePos,
    pub(crate) patrol_min_x: u32,
    pub(crate) patrol_max_x: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoomDefinition {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) grid: CollisionGrid,
    pub(crate) spawns: BTreeMap<String, TilePos>,
    pub(crate) doors: Vec<DoorDef>,
    pub(crate) enemies: Vec<EnemySpawn>,
    pub(crate) items: Vec<ItemSpawn>,
}

impl RoomDefinition {
    pub(crate) fn width(&self) -> u32 {
        self.grid.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.grid.height()
    }

    pub(crate) fn pixel_size(&self) -> (f32, f32) {
        (
            self.width() as f32 * TILE_SIZE,
            self.height() as f32 * TILE_SIZE,
        )
    }

    /// Requested spawn, then `start`, then the first spawn by name.
    pub(crate) fn resolve_spawn(&self, requested: &str) -> Option<(&str, TilePos)> {
        self.spawns
            .get_key_value(requested)
            .or_else(|| self.spawns.get_key_value(START_SPAWN))
            .or_else(|| self.spawns.iter().next())
            .map(|(name, tile)| (name.as_str(), *tile))
    }

    fn contains(&self, tile: TilePos) -> bool {
        tile.x < self.width() && tile.y < self.height()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CatalogError {
    #[error("duplicate room id '{room}'")]
    DuplicateRoom { room: String },
    #[error("{count} rooms registered, at most {max} supported")]
    TooManyRooms { count: usize, max: usize },
    #[error("room '{room}' has no spawn points")]
    NoSpawnPoints { room: String },
    #[error("room '{room}': {what} at ({x},{y}) lies outside the {width}x{height} grid")]
    OutOfBounds {
        room: String,
        what: String,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    #[error("room '{room}': door '{door}' targets unknown room '{target_room}'")]
    UnknownDoorRoom {
        room: String,
        door: String,
        target_room: String,
    },
    #[error("room '{room}': door '{door}' targets missing spawn '{target_spawn}' in '{target_room}'")]
    UnknownDoorSpawn {
        room: String,
        door: String,
        target_room: String,
        target_spawn: String,
    },
    #[error("room '{room}': enemy '{enemy}' patrol range {min}..{max} is inverted")]
    InvertedPatrol {
        room: String,
        enemy: String,
        min: u32,
        max: u32,
    },
    #[error("room '{room}': duplicate item id '{item}'")]
    DuplicateItem { room: String, item: String },
}

/// Immutable room registry keyed by room id.
#[derive(Debug, Clone)]
pub(crate) struct RoomCatalog {
    rooms: BTreeMap<String, RoomDefinition>,
}

impl RoomCatalog {
    pub(crate) fn from_rooms(rooms: Vec<RoomDefinition>) -> Result<Self, CatalogError> {
        let mut by_id = BTreeMap::new();
        for room in rooms {
            if by_id.contains_key(&room.id) {
                return Err(CatalogError::DuplicateRoom { room: room.id });
            }
            by_id.insert(room.id.clone(), room);
        }
        Ok(Self { rooms: by_id })
    }

    /// The authored rooms, validated.
    pub(crate) fn builtin() -> Result<Self, CatalogError> {
        let catalog = Self::from_rooms(layouts::all_rooms())?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub(crate) fn get(&self, room_id: &str) -> Option<&RoomDefinition> {
        self.rooms.get(room_id)
    }

    pub(crate) fn registered_room_count(&self) -> usize {
        self.rooms.len()
    }

    pub(crate) fn room_ids(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    pub(crate) fn validate(&self) -> Result<(), CatalogError> {
        if self.rooms.len() > MAX_SUPPORTED_ROOMS {
            return Err(CatalogError::TooManyRooms {
                count: self.rooms.len(),
                max: MAX_SUPPORTED_ROOMS,
            });
        }

        for room in self.rooms.values() {
            self.validate_room(room)?;
        }
        Ok(())
    }

    fn validate_room(&self, room: &RoomDefinition) -> Result<(), CatalogError> {
        if room.spawns.is_empty() {
            return Err(CatalogError::NoSpawnPoints {
                room: room.id.clone(),
            });
        }

        let check = |what: String, tile: TilePos| -> Result<(), CatalogError> {
            if room.contains(tile) {
                Ok(())
            } else {
                Err(CatalogError::OutOfBounds {
                    room: room.id.clone(),
                    what,
                    x: tile.x,
                    y: tile.y,
                    width: room.width(),
                    height: room.height(),
                })
            }
        };

        for (name, tile) in &room.spawns {
            check(format!("spawn '{name}'"), *tile)?;
        }

        for door in &room.doors {
            let last = TilePos::new(
                (door.tile.x + door.tile_width).saturating_sub(1),
                (door.tile.y + door.tile_height).saturating_sub(1),
            );
            check(format!("door '{}'", door.id), door.tile)?;
            check(format!("door '{}' extent", door.id), last)?;

            let Some(target) = self.rooms.get(&door.target_room) else {
                return Err(CatalogError::UnknownDoorRoom {
                    room: room.id.clone(),
                    door: door.id.clone(),
                    target_room: door.target_room.clone(),
                });
            };
            if !target.spawns.contains_key(&door.target_spawn) {
                return Err(CatalogError::UnknownDoorSpawn {
                    room: room.id.clone(),
                    door: door.id.clone(),
                    target_room: door.target_room.clone(),
                    target_spawn: door.target_spawn.clone(),
                });
            }
        }

        for enemy in &room.enemies {
            check(format!("enemy '{}'", enemy.id), enemy.tile)?;
            check(
                format!("enemy '{}' patrol min", enemy.id),
                TilePos::new(enemy.patrol_min_x, enemy.tile.y),
            )?;
            check(
                format!("enemy '{}' patrol max", enemy.id),
                TilePos::new(enemy.patrol_max_x, enemy.tile.y),
            )?;
            if enemy.patrol_min_x > enemy.patrol_max_x {
                return Err(CatalogError::InvertedPatrol {
                    room: room.id.clone(),
                    enemy: enemy.id.clone(),
                    min: enemy.patrol_min_x,
                    max: enemy.patrol_max_x,
                });
            }
        }

        let mut item_ids = BTreeSet::new();
        for item in &room.items {
            check(format!("item '{}'", item.id), item.tile)?;
            if !item_ids.insert(item.id.as_str()) {
                return Err(CatalogError::DuplicateItem {
                    room: room.id.clone(),
                    item: item.id.clone(),
                });
            }
        }

        Ok(())
    }
}
