use super::*;
use crate::driver::mock_driver::MockDriver;
use crate::driver::ActiveVariable;
use crate::shader_translator::{PassthroughTranslator, TranslatorResources};

fn resources() -> TranslatorResources {
    TranslatorResources {
        max_vertex_attribs: 16,
        max_vertex_uniform_vectors: 256,
        max_varying_vectors: 8,
        max_vertex_texture_image_units: 0,
        max_combined_texture_image_units: 8,
        max_texture_image_units: 8,
        max_fragment_uniform_vectors: 256,
        max_draw_buffers: 1,
        oes_standard_derivatives: false,
        oes_egl_image_external: false,
        arb_texture_rectangle: false,
    }
}

fn var(name: &str, ty: u32, size: i32) -> ActiveVariable {
    ActiveVariable { name: name.to_string(), size, ty }
}

struct Fixture {
    driver: MockDriver,
    shaders: ShaderManager,
    programs: ProgramManager,
    program: ProgramKey,
}

/// A program with a compiled vertex and fragment shader attached
fn fixture() -> Fixture {
    let mut driver = MockDriver::new();
    driver.attributes = vec![var("a_position", gl::FLOAT_VEC4, 1), var("gl_VertexID", gl::INT, 1)];
    driver.uniforms = vec![
        var("u_color", gl::FLOAT_VEC4, 1),
        var("u_offsets[0]", gl::FLOAT_VEC2, 3),
        var("u_sampler", gl::SAMPLER_2D, 1),
    ];
    let mut shaders = ShaderManager::new();
    let vs = shaders.create_shader(1, 11, gl::VERTEX_SHADER);
    shaders.set_source(vs, "attribute vec4 a_position; void main() {}".to_string());
    shaders.compile(vs, &PassthroughTranslator, &resources(), &mut driver);
    let fs = shaders.create_shader(2, 12, gl::FRAGMENT_SHADER);
    shaders.set_source(fs, "uniform vec4 u_color; void main() {}".to_string());
    shaders.compile(fs, &PassthroughTranslator, &resources(), &mut driver);

    let mut programs = ProgramManager::new(16);
    let program = programs.create_program(3, 13);
    assert!(programs.attach_shader(program, vs, &mut shaders, &mut driver));
    assert!(programs.attach_shader(program, fs, &mut shaders, &mut driver));
    Fixture { driver, shaders, programs, program }
}

// ============================================================================
// FAKE LOCATIONS
// ============================================================================

#[test]
fn test_fake_location_layout() {
    assert_eq!(fake_location(3, 0), 3);
    assert_eq!(fake_location(3, 2), 3 + (2 << 16));
    assert_eq!(decode_fake_location(3 + (2 << 16)), Some((3, 2)));
    assert_eq!(decode_fake_location(-1), None);
}

#[test]
fn test_uniform_locations_resolve_to_driver_locations() {
    let mut f = fixture();
    assert!(f.programs.link(f.program, &f.shaders, &mut f.driver));
    let exe = f.programs.program(f.program).unwrap().executable().unwrap();

    let color = exe.uniform_location("u_color");
    assert_eq!(color, 0);
    let (real, element, info) = exe.uniform_by_fake_location(color).unwrap();
    assert_eq!((real, element), (1000, 0));
    assert_eq!(info.ty, gl::FLOAT_VEC4);

    let offsets2 = exe.uniform_location("u_offsets[2]");
    assert_eq!(offsets2, fake_location(1, 2));
    let (real, element, _) = exe.uniform_by_fake_location(offsets2).unwrap();
    assert_eq!((real, element), (1102, 2));

    assert_eq!(exe.uniform_location("u_offsets[3]"), -1);
    assert_eq!(exe.uniform_location("u_offsets[x]"), -1);
    assert_eq!(exe.uniform_location("missing"), -1);
    assert!(exe.uniform_by_fake_location(fake_location(1, 3)).is_none());
}

#[test]
fn test_builtin_variables_are_skipped() {
    let mut f = fixture();
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    let exe = f.programs.program(f.program).unwrap().executable().unwrap();
    assert_eq!(exe.attribs().len(), 1);
    assert_eq!(exe.attrib_location("a_position"), 0);
    assert_eq!(exe.attrib_location("gl_VertexID"), -1);
    assert!(exe.attrib_by_location(0).is_some());
}

#[test]
fn test_bound_uniform_location_claims_slot() {
    let mut f = fixture();
    assert!(f.programs.bind_uniform_location(f.program, 5, "u_sampler"));
    assert!(!f.programs.bind_uniform_location(f.program, -1, "u_color"));
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    let exe = f.programs.program(f.program).unwrap().executable().unwrap();
    assert_eq!(exe.uniform_location("u_sampler"), 5);
    assert_eq!(exe.uniform_location("u_color"), 0);
    assert_eq!(exe.sampler_indices(), &[5]);
    assert_eq!(exe.uniform_count(), 3);
}

// ============================================================================
// LINK
// ============================================================================

#[test]
fn test_attrib_bindings_applied_before_link() {
    let mut f = fixture();
    f.programs.bind_attrib_location(f.program, 3, "a_position");
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    let bind = f.driver.calls.iter().position(|c| c == "bind_attrib_location 13 3 a_position");
    let link = f.driver.calls.iter().position(|c| c == "link_program 13");
    assert!(bind.unwrap() < link.unwrap());
    let exe = f.programs.program(f.program).unwrap().executable().unwrap();
    assert_eq!(exe.attrib_location("a_position"), 3);
}

#[test]
fn test_link_without_compiled_shaders_fails() {
    let mut driver = MockDriver::new();
    let mut shaders = ShaderManager::new();
    let vs = shaders.create_shader(1, 11, gl::VERTEX_SHADER);
    let mut programs = ProgramManager::new(16);
    let program = programs.create_program(3, 13);
    programs.attach_shader(program, vs, &mut shaders, &mut driver);
    assert!(!programs.link(program, &shaders, &mut driver));
    assert_eq!(driver.count("link_program"), 0);
    assert!(programs.program(program).unwrap().log_info().is_some());
}

#[test]
fn test_failed_relink_keeps_executable_while_in_use() {
    let mut f = fixture();
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    f.programs.use_program(f.program);
    f.driver.link_ok = false;
    assert!(!f.programs.link(f.program, &f.shaders, &mut f.driver));
    let program = f.programs.program(f.program).unwrap();
    assert!(!program.link_status());
    assert!(program.executable().is_some());
    assert_eq!(program.log_info(), Some("mock link failure"));
}

#[test]
fn test_failed_relink_drops_executable_when_unused() {
    let mut f = fixture();
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    f.driver.link_ok = false;
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    assert!(f.programs.program(f.program).unwrap().executable().is_none());
}

#[test]
fn test_program_parameters() {
    let mut f = fixture();
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    let program = f.programs.program(f.program).unwrap();
    assert_eq!(program.get_parameter(gl::LINK_STATUS), Some(1));
    assert_eq!(program.get_parameter(gl::ATTACHED_SHADERS), Some(2));
    assert_eq!(program.get_parameter(gl::ACTIVE_UNIFORMS), Some(3));
    assert_eq!(program.get_parameter(gl::ACTIVE_UNIFORM_MAX_LENGTH), Some("u_offsets[0]".len() as i32 + 1));
    assert_eq!(program.get_parameter(gl::ACTIVE_ATTRIBUTES), Some(1));
    assert_eq!(program.get_parameter(gl::BLEND), None);
}

#[test]
fn test_attach_same_type_twice_rejected() {
    let mut f = fixture();
    let vs2 = f.shaders.create_shader(4, 14, gl::VERTEX_SHADER);
    assert!(!f.programs.attach_shader(f.program, vs2, &mut f.shaders, &mut f.driver));
    let vs = f.shaders.get_shader(1).unwrap();
    assert!(f.programs.detach_shader(f.program, vs, &mut f.shaders, &mut f.driver));
    assert!(!f.programs.detach_shader(f.program, vs, &mut f.shaders, &mut f.driver));
}

// ============================================================================
// SAMPLERS / UNIFORM CLEAR
// ============================================================================

#[test]
fn test_set_samplers_records_units() {
    let mut f = fixture();
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    assert!(f.programs.set_samplers(f.program, 2, &[4]));
    assert!(!f.programs.set_samplers(f.program, 0, &[4]));
    let exe = f.programs.program(f.program).unwrap().executable().unwrap();
    assert_eq!(exe.uniform(2).unwrap().texture_units, vec![4]);
}

#[test]
fn test_clear_uniforms_zeroes_by_type() {
    let mut f = fixture();
    f.programs.link(f.program, &f.shaders, &mut f.driver);
    f.programs.clear_uniforms(f.program, &mut f.driver);
    assert!(f.driver.called("uniform_fv 1000 4 [0.0, 0.0, 0.0, 0.0]"));
    assert!(f.driver.called("uniform_fv 1100 2 [0.0, 0.0, 0.0, 0.0, 0.0, 0.0]"));
    assert!(f.driver.called("uniform_iv 1200 1 [0]"));
}

// ============================================================================
// DELETION
// ============================================================================

#[test]
fn test_delete_in_use_program_waits_for_unuse() {
    let mut f = fixture();
    f.programs.use_program(f.program);
    f.programs.mark_as_deleted(f.program, &mut f.shaders, Some(&mut f.driver));
    assert!(f.programs.is_program(3));
    assert_eq!(f.driver.count("delete_program"), 0);

    assert_eq!(f.programs.unuse_program(f.program, &mut f.shaders, Some(&mut f.driver)), Some(3));
    assert!(!f.programs.is_program(3));
    assert!(f.driver.called("delete_program 13"));
}

#[test]
fn test_deleting_program_releases_deleted_shaders() {
    let mut f = fixture();
    let vs = f.shaders.get_shader(1).unwrap();
    f.shaders.mark_as_deleted(vs, Some(&mut f.driver));
    assert!(f.shaders.is_shader(1));
    f.programs.mark_as_deleted(f.program, &mut f.shaders, Some(&mut f.driver));
    assert!(!f.shaders.is_shader(1));
    assert!(f.shaders.is_shader(2));
}
