use super::*;
use crate::gl;

// ============================================================================
// DEFAULTS
// ============================================================================

#[test]
fn test_new_validators_reject_everything() {
    let validators = Validators::new();
    assert!(!validators.texture_target.is_valid(gl::TEXTURE_2D));
    assert!(!validators.draw_mode.is_valid(gl::TRIANGLES));
    assert!(!validators.texture_format_type.is_valid(gl::RGBA, gl::UNSIGNED_BYTE));
    assert!(validators.capability.is_empty());
}

#[test]
fn test_base_values_cover_core_domains() {
    let mut validators = Validators::new();
    validators.add_base_values();
    assert!(validators.texture_target.is_valid(gl::TEXTURE_CUBE_MAP_NEGATIVE_Z));
    assert!(!validators.texture_target.is_valid(gl::TEXTURE_CUBE_MAP));
    assert!(validators.texture_bind_target.is_valid(gl::TEXTURE_CUBE_MAP));
    assert!(validators.texture_format_type.is_valid(gl::RGB, gl::UNSIGNED_SHORT_5_6_5));
    assert!(!validators.texture_format_type.is_valid(gl::RGBA, gl::UNSIGNED_SHORT_5_6_5));
    assert!(!validators.index_type.is_valid(gl::UNSIGNED_INT));
    assert!(!validators.texture_format.is_valid(gl::DEPTH_COMPONENT));
}

// ============================================================================
// VALUE VALIDATOR
// ============================================================================

#[test]
fn test_value_validator_dedups_and_removes() {
    let mut validator = ValueValidator::new();
    validator.add_values(&[1u32, 2, 2, 3]);
    assert_eq!(validator.values(), &[1, 2, 3]);
    validator.remove_value(2);
    assert!(!validator.is_valid(2));
    assert!(validator.is_valid(3));
}
