use crate::context_group::ContextGroupConfig;
use crate::decoder::commands::*;
use crate::decoder::test_support::{Harness, SHM};
use crate::decoder::{CommandError, ContextAttribs};
use crate::driver::mock_driver::MockDriver;
use crate::driver::ActiveVariable;
use crate::gl;

fn var(name: &str, ty: u32, size: i32) -> ActiveVariable {
    ActiveVariable { name: name.to_string(), size, ty }
}

/// Mock reporting `color` (vec4), `mvp` (mat4), `tex` (sampler) and `arr[3]` (vec4)
fn uniform_driver() -> MockDriver {
    let mut driver = MockDriver::new();
    driver.attributes = vec![var("position", gl::FLOAT_VEC4, 1)];
    driver.uniforms = vec![
        var("color", gl::FLOAT_VEC4, 1),
        var("mvp", gl::FLOAT_MAT4, 1),
        var("tex", gl::SAMPLER_2D, 1),
        var("arr[0]", gl::FLOAT_VEC4, 3),
    ];
    driver
}

/// Program 1 linked from shaders 2 and 3, current, with its uniform table
fn current_program() -> Harness {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.linked_program(1, 2, 3);
    h.ok(UseProgram { program: 1 });
    assert_eq!(h.error(), gl::NO_ERROR);
    h
}

fn uniform_location(h: &mut Harness, program: u32, name: &str) -> i32 {
    h.set_bucket(4, name);
    h.write_u32(0, -1i32 as u32);
    h.ok(GetUniformLocationBucket { program, name_bucket_id: 4, location_shm_id: SHM, location_shm_offset: 0 });
    h.read_u32(0) as i32
}

fn program_iv(h: &mut Harness, program: u32, pname: u32) -> i32 {
    h.write_u32(0, 0);
    h.ok(GetProgramiv { program, pname, params_shm_id: SHM, params_shm_offset: 0 });
    h.read_u32(4) as i32
}

// ============================================================================
// SHADERS
// ============================================================================

#[test]
fn test_create_shader_rejects_invalid_type() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::TEXTURE_2D, client_id: 1 });
    assert_eq!(h.error(), gl::INVALID_ENUM);
    h.ok(IsShader { shader: 1, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 0);
}

#[test]
fn test_shaders_and_programs_share_ids() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 1 });
    assert_eq!(h.run(CreateProgram { client_id: 1 }), Err(CommandError::InvalidArguments));
    assert_eq!(
        h.run(CreateShader { shader_type: gl::FRAGMENT_SHADER, client_id: 1 }),
        Err(CommandError::InvalidArguments)
    );
}

#[test]
fn test_shader_source_needs_bucket() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 1 });
    assert_eq!(
        h.run(ShaderSourceBucket { shader: 1, data_bucket_id: 42 }),
        Err(CommandError::InvalidArguments)
    );
}

#[test]
fn test_compile_shader_reports_status() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::FRAGMENT_SHADER, client_id: 1 });
    h.set_bucket(2, "void main() { gl_FragColor = vec4(1.0); }");
    h.ok(ShaderSourceBucket { shader: 1, data_bucket_id: 2 });
    h.ok(CompileShader { shader: 1 });
    assert!(h.count("compile_shader") == 1);

    h.write_u32(0, 0);
    h.ok(GetShaderiv { shader: 1, pname: gl::COMPILE_STATUS, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 1);
    assert_eq!(h.read_u32(4), 1);

    h.ok(GetTranslatedShaderSourceANGLE { shader: 1, bucket_id: 3 });
    assert_eq!(h.bucket(3).as_deref(), Some("void main() { gl_FragColor = vec4(1.0); }"));
}

#[test]
fn test_failed_translation_keeps_driver_untouched() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 1 });
    h.set_bucket(2, "void helper() {}");
    h.ok(ShaderSourceBucket { shader: 1, data_bucket_id: 2 });
    h.ok(CompileShader { shader: 1 });
    assert_eq!(h.count("compile_shader"), 0);

    h.write_u32(0, 0);
    h.ok(GetShaderiv { shader: 1, pname: gl::COMPILE_STATUS, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(h.read_u32(4), 0);

    h.ok(GetShaderInfoLog { shader: 1, bucket_id: 3 });
    assert!(h.bucket(3).unwrap().contains("main"));
}

#[test]
fn test_get_shader_iv_requires_zeroed_result() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 1 });
    h.write_u32(0, 7);
    let result = h.run(GetShaderiv { shader: 1, pname: gl::SHADER_TYPE, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(result, Err(CommandError::InvalidArguments));
}

#[test]
fn test_unknown_shader_is_invalid_value() {
    let mut h = Harness::new();
    h.ok(CompileShader { shader: 9 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
}

#[test]
fn test_wrong_kind_of_id_is_invalid_operation() {
    let mut h = Harness::new();
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 1 });
    h.ok(CreateProgram { client_id: 2 });
    assert_eq!(h.error(), gl::NO_ERROR);

    h.ok(CompileShader { shader: 2 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    h.ok(LinkProgram { program: 1 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    h.ok(AttachShader { program: 1, shader: 2 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);

    h.ok(LinkProgram { program: 9 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
}

#[test]
fn test_deleted_shader_lives_while_attached() {
    let mut h = Harness::new();
    h.linked_program(1, 2, 3);
    h.ok(DeleteShader { shader: 2 });
    assert_eq!(h.count("delete_shader"), 1);
    h.ok(IsShader { shader: 2, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 1);

    // Still attached: the name stays reserved
    assert_eq!(
        h.run(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 }),
        Err(CommandError::InvalidArguments)
    );

    h.ok(DetachShader { program: 1, shader: 2 });
    h.ok(IsShader { shader: 2, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 0);
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 });
    assert_eq!(h.error(), gl::NO_ERROR);
}

// ============================================================================
// PROGRAMS
// ============================================================================

#[test]
fn test_attach_two_shaders_of_same_type() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 });
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 3 });
    h.ok(AttachShader { program: 1, shader: 2 });
    h.ok(AttachShader { program: 1, shader: 3 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    assert_eq!(program_iv(&mut h, 1, gl::ATTACHED_SHADERS), 1);
}

#[test]
fn test_detach_unattached_shader() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 });
    h.ok(DetachShader { program: 1, shader: 2 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_link_reports_status() {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.linked_program(1, 2, 3);
    assert_eq!(program_iv(&mut h, 1, gl::LINK_STATUS), 1);
    assert_eq!(program_iv(&mut h, 1, gl::ACTIVE_UNIFORMS), 4);
    assert_eq!(program_iv(&mut h, 1, gl::ACTIVE_ATTRIBUTES), 1);
    assert_eq!(program_iv(&mut h, 1, gl::ATTACHED_SHADERS), 2);
}

#[test]
fn test_link_without_compiled_shaders_fails() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 });
    h.ok(AttachShader { program: 1, shader: 2 });
    h.ok(LinkProgram { program: 1 });
    assert_eq!(h.count("link_program"), 0);
    assert_eq!(program_iv(&mut h, 1, gl::LINK_STATUS), 0);

    h.ok(GetProgramInfoLog { program: 1, bucket_id: 5 });
    assert!(!h.bucket(5).unwrap().is_empty());
}

#[test]
fn test_driver_link_failure() {
    let mut driver = MockDriver::new();
    driver.link_ok = false;
    let mut h = Harness::with_driver(driver, ContextAttribs::default());
    h.linked_program(1, 2, 3);
    assert_eq!(h.count("link_program"), 1);
    assert_eq!(program_iv(&mut h, 1, gl::LINK_STATUS), 0);
    h.ok(GetProgramInfoLog { program: 1, bucket_id: 5 });
    assert_eq!(h.bucket(5).as_deref(), Some("mock link failure"));
}

#[test]
fn test_use_unlinked_program() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.ok(UseProgram { program: 1 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    assert!(h.decoder.state.current_program.is_none());
}

#[test]
fn test_use_program_binds_service_id() {
    let mut h = current_program();
    let key = h.decoder.state.current_program.unwrap();
    let service = {
        let mut group = h.group.lock().unwrap();
        let res = group.resources().unwrap();
        res.programs.program(key).unwrap().service_id()
    };
    assert!(h.called(&format!("use_program {}", service)));

    h.clear_calls();
    h.ok(UseProgram { program: 1 });
    assert_eq!(h.count("use_program"), 0);
    h.ok(UseProgram { program: 0 });
    assert!(h.called("use_program 0"));
    assert!(h.decoder.state.current_program.is_none());
}

#[test]
fn test_deleted_current_program_survives_until_unused() {
    let mut h = current_program();
    h.ok(DeleteProgram { program: 1 });
    assert_eq!(h.count("delete_program"), 0);
    assert_eq!(program_iv(&mut h, 1, gl::DELETE_STATUS), 1);

    h.ok(UseProgram { program: 0 });
    assert_eq!(h.count("delete_program"), 1);
    h.ok(IsProgram { program: 1, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 0);

    // The client id is free again
    h.ok(CreateProgram { client_id: 1 });
    assert_eq!(h.error(), gl::NO_ERROR);
}

#[test]
fn test_get_program_iv_invalid_pname() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.write_u32(0, 0);
    h.ok(GetProgramiv { program: 1, pname: gl::TEXTURE_2D, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(h.error(), gl::INVALID_ENUM);
}

#[test]
fn test_clear_uniforms_on_first_use() {
    let config = ContextGroupConfig { workarounds: "2".to_string(), ..Default::default() };
    let mut h = Harness::with_config(uniform_driver(), ContextAttribs::default(), config);
    h.linked_program(1, 2, 3);
    h.clear_calls();
    h.ok(UseProgram { program: 1 });
    assert!(h.called("uniform_fv 1000 4 [0.0, 0.0, 0.0, 0.0]"));
    assert!(h.count("uniform_matrix_fv 1100") == 1);

    h.ok(UseProgram { program: 0 });
    h.clear_calls();
    h.ok(UseProgram { program: 1 });
    assert_eq!(h.count("uniform_fv"), 0);
}

// ============================================================================
// LOCATIONS
// ============================================================================

#[test]
fn test_uniform_locations_are_fake() {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.linked_program(1, 2, 3);
    assert_eq!(uniform_location(&mut h, 1, "color"), 0);
    assert_eq!(uniform_location(&mut h, 1, "mvp"), 1);
    assert_eq!(uniform_location(&mut h, 1, "arr"), 3);
    assert_eq!(uniform_location(&mut h, 1, "arr[2]"), 3 + (2 << 16));
    assert_eq!(uniform_location(&mut h, 1, "arr[3]"), -1);
    assert_eq!(uniform_location(&mut h, 1, "missing"), -1);
    assert_eq!(uniform_location(&mut h, 1, "gl_DepthRange"), -1);
}

#[test]
fn test_location_query_requires_preset() {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.linked_program(1, 2, 3);
    h.set_bucket(4, "color");
    h.write_u32(0, 0);
    let result = h.run(GetUniformLocationBucket { program: 1, name_bucket_id: 4, location_shm_id: SHM, location_shm_offset: 0 });
    assert_eq!(result, Err(CommandError::InvalidArguments));
}

#[test]
fn test_location_of_unlinked_program() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    assert_eq!(uniform_location(&mut h, 1, "color"), -1);
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_attrib_location() {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.linked_program(1, 2, 3);
    h.set_bucket(4, "position");
    h.write_u32(0, -1i32 as u32);
    h.ok(GetAttribLocationBucket { program: 1, name_bucket_id: 4, location_shm_id: SHM, location_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 0);
}

#[test]
fn test_bind_attrib_location_checks() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.set_bucket(4, "position");
    h.ok(BindAttribLocationBucket { program: 1, index: 16, name_bucket_id: 4 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
    h.set_bucket(4, "gl_Vertex");
    h.ok(BindAttribLocationBucket { program: 1, index: 0, name_bucket_id: 4 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_bound_attrib_location_applies_at_link() {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.ok(CreateProgram { client_id: 1 });
    h.set_bucket(4, "position");
    h.ok(BindAttribLocationBucket { program: 1, index: 5, name_bucket_id: 4 });
    assert_eq!(h.count("bind_attrib_location"), 0);

    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 });
    h.ok(CreateShader { shader_type: gl::FRAGMENT_SHADER, client_id: 3 });
    h.set_bucket(9, "void main() {}");
    h.ok(ShaderSourceBucket { shader: 2, data_bucket_id: 9 });
    h.ok(ShaderSourceBucket { shader: 3, data_bucket_id: 9 });
    h.ok(CompileShader { shader: 2 });
    h.ok(CompileShader { shader: 3 });
    h.ok(AttachShader { program: 1, shader: 2 });
    h.ok(AttachShader { program: 1, shader: 3 });
    h.ok(LinkProgram { program: 1 });
    assert_eq!(h.count("bind_attrib_location"), 1);

    h.set_bucket(4, "position");
    h.write_u32(0, -1i32 as u32);
    h.ok(GetAttribLocationBucket { program: 1, name_bucket_id: 4, location_shm_id: SHM, location_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 5);
}

#[test]
fn test_bind_uniform_location_reorders_table() {
    let mut h = Harness::with_driver(uniform_driver(), ContextAttribs::default());
    h.ok(CreateProgram { client_id: 1 });
    h.set_bucket(4, "mvp");
    h.ok(BindUniformLocationCHROMIUMBucket { program: 1, location: 7, name_bucket_id: 4 });
    assert_eq!(h.error(), gl::NO_ERROR);

    h.ok(CreateShader { shader_type: gl::VERTEX_SHADER, client_id: 2 });
    h.ok(CreateShader { shader_type: gl::FRAGMENT_SHADER, client_id: 3 });
    h.set_bucket(9, "void main() {}");
    for shader in [2, 3] {
        h.ok(ShaderSourceBucket { shader, data_bucket_id: 9 });
        h.ok(CompileShader { shader });
        h.ok(AttachShader { program: 1, shader });
    }
    h.ok(LinkProgram { program: 1 });

    assert_eq!(uniform_location(&mut h, 1, "mvp"), 7);
    assert_eq!(uniform_location(&mut h, 1, "color"), 0);
    assert_eq!(uniform_location(&mut h, 1, "tex"), 1);
}

#[test]
fn test_bind_uniform_location_out_of_range() {
    let mut h = Harness::new();
    h.ok(CreateProgram { client_id: 1 });
    h.set_bucket(4, "mvp");
    h.ok(BindUniformLocationCHROMIUMBucket { program: 1, location: -1, name_bucket_id: 4 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
    h.set_bucket(4, "gl_Foo");
    h.ok(BindUniformLocationCHROMIUMBucket { program: 1, location: 1, name_bucket_id: 4 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

// ============================================================================
// UNIFORMS
// ============================================================================

#[test]
fn test_uniform_without_program() {
    let mut h = Harness::new();
    h.ok(Uniform1f { location: 0, x: 1.0 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_uniform_minus_one_is_ignored() {
    let mut h = current_program();
    h.clear_calls();
    h.ok(Uniform4f { location: -1, x: 1.0, y: 1.0, z: 1.0, w: 1.0 });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert_eq!(h.count("uniform_fv"), 0);
}

#[test]
fn test_uniform_4f_uses_real_location() {
    let mut h = current_program();
    h.ok(Uniform4f { location: 0, x: 1.0, y: 2.0, z: 3.0, w: 4.0 });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called("uniform_fv 1000 4 [1.0, 2.0, 3.0, 4.0]"));
}

#[test]
fn test_uniform_type_mismatch() {
    let mut h = current_program();
    h.ok(Uniform1f { location: 0, x: 1.0 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    h.ok(Uniform4f { location: 1, x: 1.0, y: 2.0, z: 3.0, w: 4.0 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_uniform_unknown_location() {
    let mut h = current_program();
    h.ok(Uniform4f { location: 40, x: 0.0, y: 0.0, z: 0.0, w: 0.0 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_uniform_array_count_is_clamped() {
    let mut h = current_program();
    let data: Vec<u32> = (0..12).map(|i| (i as f32).to_bits()).collect();
    // Element 2 of a 3-element array: only one vec4 fits
    let result = h.run_with(Uniform4fvImmediate { location: 3 + (2 << 16), count: 3 }, &data);
    assert!(result.is_ok());
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called("uniform_fv 1302 4 [0.0, 1.0, 2.0, 3.0]"));
}

#[test]
fn test_uniform_count_on_non_array() {
    let mut h = current_program();
    let data: Vec<u32> = vec![0; 8];
    assert!(h.run_with(Uniform4fvImmediate { location: 0, count: 2 }, &data).is_ok());
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_uniform_payload_too_short() {
    let mut h = current_program();
    let result = h.run_with(Uniform4fvImmediate { location: 0, count: 2 }, &[0; 4]);
    assert_eq!(result, Err(CommandError::OutOfBounds));
}

#[test]
fn test_uniform_matrix_transpose_rejected() {
    let mut h = current_program();
    let data = vec![0; 16];
    assert!(h.run_with(UniformMatrix4fvImmediate { location: 1, count: 1, transpose: 1 }, &data).is_ok());
    assert_eq!(h.error(), gl::INVALID_VALUE);

    assert!(h.run_with(UniformMatrix4fvImmediate { location: 1, count: 1, transpose: 0 }, &data).is_ok());
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called("uniform_matrix_fv 1100 4 16"));
}

#[test]
fn test_sampler_uniform_records_unit() {
    let mut h = current_program();
    h.ok(Uniform1i { location: 2, x: 3 });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called("uniform_iv 1200 1 [3]"));

    let key = h.decoder.state.current_program.unwrap();
    let mut group = h.group.lock().unwrap();
    let res = group.resources().unwrap();
    let exe = res.programs.program(key).unwrap().executable().unwrap();
    assert_eq!(exe.uniform(2).unwrap().texture_units, vec![3]);
}

#[test]
fn test_sampler_unit_out_of_range() {
    let mut h = current_program();
    h.ok(Uniform1i { location: 2, x: 32 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
    assert_eq!(h.count("uniform_iv"), 0);
}

#[test]
fn test_get_uniform_fv() {
    let mut h = current_program();
    h.write_u32(0, 0);
    h.ok(GetUniformfv { program: 1, location: 0, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called("get_uniform_fv 1000"));
    assert_eq!(h.read_u32(0), 4);
}
