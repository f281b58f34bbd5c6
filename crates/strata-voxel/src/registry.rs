//! Block registry: maps compact [`BlockId`] values to [`BlockDef`] metadata and
//! classifies blocks into mesh groups for the mesher.
//!
//! Air is always ID 0 so that an empty chunk is a single run of zeroes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Compact block identifier stored in every chunk run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The empty block.
    pub const AIR: BlockId = BlockId(0);
}

/// Partition of block ids used by the mesher: a face exists only between
/// cells of different groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeshGroup {
    /// No geometry (air).
    Empty,
    /// See-through geometry (water, glass).
    Translucent,
    /// Solid geometry that occludes its neighbours.
    Opaque,
}

/// Descriptor for a block type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDef {
    /// Human-readable name (e.g. "stone", "water").
    pub name: String,
    /// Mesh group the block belongs to.
    pub group: MeshGroup,
    /// Atlas tile used for side and bottom faces.
    pub material_index: u16,
    /// Atlas tile for the top face, when it differs from the sides.
    pub top_material_index: Option<u16>,
}

/// Errors that can occur during block registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A block with the same name has already been registered.
    #[error("duplicate block name: {0}")]
    DuplicateName(String),
    /// All 65 536 slots have been consumed.
    #[error("block registry is full (max 65536 types)")]
    RegistryFull,
}

/// Strategy that assigns a mesh group to every block id.
///
/// Injected into the mesher so the classification can be swapped without
/// touching the meshing algorithm.
pub trait BlockClassifier: Send + Sync {
    /// Mesh group of `block`.
    fn mesh_group(&self, block: BlockId) -> MeshGroup;

    /// Whether `block` occludes light for ambient occlusion.
    fn is_opaque(&self, block: BlockId) -> bool {
        self.mesh_group(block) == MeshGroup::Opaque
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps [`BlockId`] → [`BlockDef`] with O(1) lookup by index and by name.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    /// Dense array where `index == BlockId.0`.
    blocks: Vec<BlockDef>,
    /// Reverse lookup: name → ID.
    name_to_id: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Creates a new registry with air pre-registered as ID 0.
    pub fn new() -> Self {
        let air = BlockDef {
            name: "air".to_string(),
            group: MeshGroup::Empty,
            material_index: 0,
            top_material_index: None,
        };

        let mut name_to_id = HashMap::new();
        name_to_id.insert("air".to_string(), BlockId::AIR);

        Self {
            blocks: vec![air],
            name_to_id,
        }
    }

    /// Registry with the terrain blocks used by the default palette:
    /// air, stone, dirt, grass, sand and water (IDs 0..=5 in that order).
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        let defaults = [
            ("stone", MeshGroup::Opaque, 1, None),
            ("dirt", MeshGroup::Opaque, 2, None),
            ("grass", MeshGroup::Opaque, 3, Some(4)),
            ("sand", MeshGroup::Opaque, 5, None),
            ("water", MeshGroup::Translucent, 6, None),
        ];
        for (name, group, material_index, top_material_index) in defaults {
            // A fresh registry holds only air, so these names cannot collide.
            let _ = reg.register(BlockDef {
                name: name.to_string(),
                group,
                material_index,
                top_material_index,
            });
        }
        reg
    }

    /// Registers a new block and returns its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateName`] if the name is taken, or
    /// [`RegistryError::RegistryFull`] if all slots are consumed.
    pub fn register(&mut self, def: BlockDef) -> Result<BlockId, RegistryError> {
        if self.name_to_id.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        if self.blocks.len() > u16::MAX as usize {
            return Err(RegistryError::RegistryFull);
        }

        let id = BlockId(self.blocks.len() as u16);
        self.name_to_id.insert(def.name.clone(), id);
        self.blocks.push(def);
        Ok(id)
    }

    /// Returns the definition for `id`, or `None` if it was never registered.
    pub fn get(&self, id: BlockId) -> Option<&BlockDef> {
        self.blocks.get(id.0 as usize)
    }

    /// Returns the ID for a named block.
    pub fn lookup_by_name(&self, name: &str) -> Option<BlockId> {
        self.name_to_id.get(name).copied()
    }

    /// Total number of registered blocks (including air).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if only air is registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.len() <= 1
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockClassifier for BlockRegistry {
    /// Unregistered ids classify as opaque so corrupt data never opens holes.
    fn mesh_group(&self, block: BlockId) -> MeshGroup {
        self.get(block).map_or(MeshGroup::Opaque, |def| def.group)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn glass() -> BlockDef {
        BlockDef {
            name: "glass".to_string(),
            group: MeshGroup::Translucent,
            material_index: 9,
            top_material_index: None,
        }
    }

    #[test]
    fn test_air_is_id_zero() {
        let reg = BlockRegistry::new();
        assert_eq!(reg.lookup_by_name("air"), Some(BlockId::AIR));
        assert_eq!(reg.mesh_group(BlockId::AIR), MeshGroup::Empty);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut reg = BlockRegistry::new();
        let id = reg.register(glass()).expect("register glass");
        assert_eq!(id, BlockId(1));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get(id).map(|d| d.name.as_str()), Some("glass"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut reg = BlockRegistry::new();
        reg.register(glass()).expect("first registration");
        assert!(matches!(
            reg.register(glass()),
            Err(RegistryError::DuplicateName(name)) if name == "glass"
        ));
    }

    #[test]
    fn test_default_blocks_classify() {
        let reg = BlockRegistry::with_defaults();
        let stone = reg.lookup_by_name("stone").expect("stone");
        let water = reg.lookup_by_name("water").expect("water");
        assert_eq!(stone, BlockId(1));
        assert_eq!(water, BlockId(5));
        assert!(reg.is_opaque(stone));
        assert_eq!(reg.mesh_group(water), MeshGroup::Translucent);
        assert!(!reg.is_opaque(water));
    }

    #[test]
    fn test_unknown_id_is_opaque() {
        let reg = BlockRegistry::new();
        assert_eq!(reg.mesh_group(BlockId(999)), MeshGroup::Opaque);
    }
}
