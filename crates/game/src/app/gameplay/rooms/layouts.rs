use std::collections::BTreeMap;

use super::{CollisionGrid, DoorDef, EnemySpawn, ItemKind, ItemSpawn, RoomDefinition, TilePos};

pub(super) fn all_rooms() -> Vec<RoomDefinition> {
    vec![
        entry_grotto(),
        shiver_gallery(),
        overhang_split(),
        long_resonance_hall(),
        vertical_cache(),
        canopy_relay(),
    ]
}

fn room(id: &str, name: &str, grid: CollisionGrid) -> RoomDefinition {
    RoomDefinition {
        id: id.to_string(),
        name: name.to_string(),
        grid,
        spawns: BTreeMap::new(),
        doors: Vec::new(),
        enemies: Vec::new(),
        items: Vec::new(),
    }
}

fn spawn(room: &mut RoomDefinition, name: &str, x: u32, y: u32) {
    room.spawns.insert(name.to_string(), TilePos::new(x, y));
}

#[allow(clippy::too_many_arguments)]
fn door(
    room: &mut RoomDefinition,
    id: &str,
    x: u32,
    y: u32,
    tile_width: u32,
    tile_height: u32,
    target_room: &str,
    target_spawn: &str,
) {
    room.doors.push(DoorDef {
        id: id.to_string(),
        tile: TilePos::new(x, y),
        tile_width,
        tile_height,
        target_room: target_room.to_string(),
        target_spawn: target_spawn.to_string(),
    });
}

fn crawler(room: &mut RoomDefinition, id: &str, x: u32, y: u32, patrol_min_x: u32, patrol_max_x: u32) {
    room.enemies.push(EnemySpawn {
        id: id.to_string(),
        archetype: "crawler".to_string(),
        tile: TilePos::new(x, y),
        patrol_min_x,
        patrol_max_x,
    });
}

fn item(
    room: &mut RoomDefinition,
    id: &str,
    kind: ItemKind,
    x: u32,
    y: u32,
    amount: Option<u32>,
    level: Option<u32>,
) {
    room.items.push(ItemSpawn {
        id: id.to_string(),
        kind,
        tile: TilePos::new(x, y),
        amount,
        level,
    });
}

fn entry_grotto() -> RoomDefinition {
    let (width, height) = (44, 22);
    let mut grid = CollisionGrid::new(width, height);
    grid.fill_ground(3);
    grid.add_platform(15, 5, 14);
    grid.add_platform(12, 18, 28);
    grid.add_platform(8, 24, 34);
    grid.add_platform(4, 22, 30);
    grid.add_wall(0, 10, 21);
    grid.add_wall(width - 1, 8, 21);

    let mut room = room("room_01", "Entry Grotto", grid);
    spawn(&mut room, "start", 3, 17);
    spawn(&mut room, "from_right", width - 4, 17);
    door(&mut room, "r01_to_r02", width - 1, 7, 1, 5, "room_02", "from_left");
    crawler(&mut room, "r01_enemy_1", 12, 14, 8, 15);
    room
}

fn shiver_gallery() -> RoomDefinition {
    let (width, height) = (56, 24);
    let mut grid = CollisionGrid::new(width, height);
    grid.fill_ground(3);
    grid.add_platform(18, 7, 16);
    grid.add_platform(14, 22, 34);
    grid.add_platform(10, 39, 49);
    grid.add_wall(0, 8, 23);
    grid.add_wall(width - 1, 8, 23);

    let mut room = room("room_02", "Shiver Gallery", grid);
    spawn(&mut room, "from_left", 2, 19);
    spawn(&mut room, "from_right", width - 4, 19);
    spawn(&mut room, "from_upper", 24, 11);
    door(&mut room, "r02_to_r01", 0, 7, 1, 5, "room_01", "from_right");
    door(&mut room, "r02_to_r03", width - 1, 7, 1, 5, "room_03", "from_left");
    door(&mut room, "r02_to_r05", 24, 0, 3, 1, "room_05", "from_bottom");
    item(
        &mut room,
        "item_missile_rack_1",
        ItemKind::MissilePack,
        47,
        8,
        Some(5),
        None,
    );
    crawler(&mut room, "r02_enemy_1", 14, 17, 9, 17);
    crawler(&mut room, "r02_enemy_2", 28, 13, 23, 34);
    room
}

fn overhang_split() -> RoomDefinition {
    let (width, height) = (48, 20);
    let mut grid = CollisionGrid::new(width, height);
    grid.fill_ground(2);
    grid.add_platform(14, 5, 12);
    grid.add_platform(10, 15, 24);
    grid.add_platform(6, 28, 38);
    grid.add_wall(0, 6, 19);
    grid.add_wall(width - 1, 6, 19);

    let mut room = room("room_03", "Overhang Split", grid);
    spawn(&mut room, "from_left", 3, 16);
    spawn(&mut room, "from_right", width - 4, 16);
    door(&mut room, "r03_to_r02", 0, 6, 1, 5, "room_02", "from_right");
    door(&mut room, "r03_to_r04", width - 1, 6, 1, 5, "room_04", "from_left");
    item(
        &mut room,
        "upgrade_dash_module",
        ItemKind::DashModule,
        36,
        5,
        None,
        None,
    );
    crawler(&mut room, "r03_enemy_1", 8, 13, 5, 12);
    room
}

fn long_resonance_hall() -> RoomDefinition {
    let (width, height) = (64, 28);
    let mut grid = CollisionGrid::new(width, height);
    grid.fill_ground(3);
    grid.add_platform(20, 8, 20);
    grid.add_platform(16, 24, 36);
    grid.add_platform(12, 40, 53);
    grid.add_wall(0, 9, 27);
    grid.add_wall(width - 1, 9, 27);

    let mut room = room("room_04", "Long Resonance Hall", grid);
    spawn(&mut room, "from_left", 3, 22);
    spawn(&mut room, "from_bottom", 51, 15);
    door(&mut room, "r04_to_r03", 0, 8, 1, 5, "room_03", "from_right");
    door(&mut room, "r04_to_r06", 50, 0, 3, 1, "room_06", "from_bottom");
    item(
        &mut room,
        "item_super_pack_1",
        ItemKind::SuperPack,
        45,
        11,
        Some(2),
        None,
    );
    crawler(&mut room, "r04_enemy_1", 18, 19, 10, 20);
    crawler(&mut room, "r04_enemy_2", 33, 15, 25, 36);
    room
}

fn vertical_cache() -> RoomDefinition {
    let (width, height) = (32, 30);
    let mut grid = CollisionGrid::new(width, height);
    grid.fill_ground(2);
    grid.add_platform(24, 4, 12);
    grid.add_platform(18, 14, 24);
    grid.add_platform(12, 8, 15);
    grid.add_platform(6, 18, 28);
    grid.add_wall(0, 5, 29);
    grid.add_wall(width - 1, 5, 29);

    let mut room = room("room_05", "Vertical Cache", grid);
    spawn(&mut room, "from_bottom", 14, 26);
    spawn(&mut room, "from_top", 20, 7);
    door(&mut room, "r05_to_r02", 13, height - 1, 3, 1, "room_02", "from_upper");
    door(&mut room, "r05_to_r06", 19, 0, 2, 1, "room_06", "from_left");
    item(
        &mut room,
        "suit_mk2",
        ItemKind::SuitUpgrade,
        24,
        5,
        None,
        Some(2),
    );
    crawler(&mut room, "r05_enemy_1", 10, 23, 5, 12);
    room
}

fn canopy_relay() -> RoomDefinition {
    let (width, height) = (40, 18);
    let mut grid = CollisionGrid::new(width, height);
    grid.fill_ground(3);
    grid.add_platform(12, 5, 14);
    grid.add_platform(9, 18, 27);
    grid.add_platform(6, 30, 36);
    grid.add_wall(0, 5, 17);
    grid.add_wall(width - 1, 5, 17);

    let mut room = room("room_06", "Canopy Relay", grid);
    spawn(&mut room, "from_left", 2, 13);
    spawn(&mut room, "from_bottom", 31, 7);
    door(&mut room, "r06_to_r05", 0, 6, 1, 4, "room_05", "from_top");
    door(&mut room, "r06_to_r04", 30, height - 1, 3, 1, "room_04", "from_bottom");
    crawler(&mut room, "r06_enemy_1", 12, 11, 6, 14);
    room
}
