use libc::c_uint;

bitflags! {
    /// Post-processing steps forwarded untouched to the engine.
    pub struct PostProcessSteps: c_uint {
        const CALC_TANGENT_SPACE = 0x1;
        const JOIN_IDENTICAL_VERTICES = 0x2;
        const MAKE_LEFT_HANDED = 0x4;
        const TRIANGULATE = 0x8;
        const REMOVE_COMPONENT = 0x10;
        const GEN_NORMALS = 0x20;
        const GEN_SMOOTH_NORMALS = 0x40;
        const SPLIT_LARGE_MESHES = 0x80;
        const PRE_TRANSFORM_VERTICES = 0x100;
        const LIMIT_BONE_WEIGHTS = 0x200;
        const VALIDATE_DATA_STRUCTURE = 0x400;
        const IMPROVE_CACHE_LOCALITY = 0x800;
        const REMOVE_REDUNDANT_MATERIALS = 0x1000;
        const FIX_INFACING_NORMALS = 0x2000;
        const POPULATE_ARMATURE_DATA = 0x4000;
        const SORT_BY_PTYPE = 0x8000;
        const FIND_DEGENERATES = 0x10000;
        const FIND_INVALID_DATA = 0x20000;
        const GEN_UV_COORDS = 0x40000;
        const TRANSFORM_UV_COORDS = 0x80000;
        const FIND_INSTANCES = 0x100000;
        const OPTIMIZE_MESHES = 0x200000;
        const OPTIMIZE_GRAPH = 0x400000;
        const FLIP_UVS = 0x800000;
        const FLIP_WINDING_ORDER = 0x1000000;
        const SPLIT_BY_BONE_COUNT = 0x2000000;
        const DEBONE = 0x4000000;
        const GLOBAL_SCALE = 0x8000000;
        const EMBED_TEXTURES = 0x10000000;
        const FORCE_GEN_NORMALS = 0x20000000;
        const DROP_NORMALS = 0x40000000;
        const GEN_BOUNDING_BOXES = 0x80000000;

        const CONVERT_TO_LEFT_HANDED = Self::MAKE_LEFT_HANDED.bits
                                     | Self::FLIP_UVS.bits
                                     | Self::FLIP_WINDING_ORDER.bits;

        const TARGET_REALTIME_FAST = Self::CALC_TANGENT_SPACE.bits
                                   | Self::GEN_NORMALS.bits
                                   | Self::JOIN_IDENTICAL_VERTICES.bits
                                   | Self::TRIANGULATE.bits
                                   | Self::GEN_UV_COORDS.bits
                                   | Self::SORT_BY_PTYPE.bits;

        const TARGET_REALTIME_QUALITY = Self::CALC_TANGENT_SPACE.bits
                                      | Self::GEN_SMOOTH_NORMALS.bits
                                      | Self::JOIN_IDENTICAL_VERTICES.bits
                                      | Self::IMPROVE_CACHE_LOCALITY.bits
                                      | Self::LIMIT_BONE_WEIGHTS.bits
                                      | Self::REMOVE_REDUNDANT_MATERIALS.bits
                                      | Self::SPLIT_LARGE_MESHES.bits
                                      | Self::TRIANGULATE.bits
                                      | Self::GEN_UV_COORDS.bits
                                      | Self::SORT_BY_PTYPE.bits
                                      | Self::FIND_DEGENERATES.bits
                                      | Self::FIND_INVALID_DATA.bits;

        const TARGET_REALTIME_MAX_QUALITY = Self::TARGET_REALTIME_QUALITY.bits
                                          | Self::FIND_INSTANCES.bits
                                          | Self::VALIDATE_DATA_STRUCTURE.bits
                                          | Self::OPTIMIZE_MESHES.bits;
    }
}

impl Default for PostProcessSteps {
    fn default() -> PostProcessSteps {
        PostProcessSteps::empty()
    }
}

#[test]
fn raw_flags_survive_the_c_boundary() {
    let raw: c_uint = 0x8 | 0x8000 | 0x80000000;
    let steps = PostProcessSteps::from_bits_truncate(raw);
    assert_eq!(steps.bits(), raw);
    assert!(steps.contains(PostProcessSteps::TRIANGULATE | PostProcessSteps::GEN_BOUNDING_BOXES));
    assert!(PostProcessSteps::TARGET_REALTIME_FAST.contains(PostProcessSteps::TRIANGULATE));
}
