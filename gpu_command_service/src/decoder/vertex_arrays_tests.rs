use crate::decoder::commands::*;
use crate::decoder::test_support::{Harness, SHM};
use crate::decoder::CommandError;
use crate::gl;

fn array_buffer(h: &mut Harness, id: u32) {
    h.gen_buffer(id);
    h.ok(BindBuffer { target: gl::ARRAY_BUFFER, buffer: id });
    h.ok(BufferData { target: gl::ARRAY_BUFFER, size: 256, data_shm_id: 0, data_shm_offset: 0, usage: gl::STATIC_DRAW });
}

fn pointer(index: u32, size: i32, ty: u32, stride: i32, offset: u32) -> VertexAttribPointer {
    VertexAttribPointer { index, size, ty, normalized: 0, stride, offset }
}

// ============================================================================
// ATTRIBUTES
// ============================================================================

#[test]
fn test_enable_out_of_range_index() {
    let mut h = Harness::new();
    h.ok(EnableVertexAttribArray { index: 16 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
    h.ok(EnableVertexAttribArray { index: 15 });
    assert_eq!(h.error(), gl::NO_ERROR);
    assert!(h.called("enable_vertex_attrib_array 15"));
}

#[test]
fn test_pointer_requires_array_buffer() {
    let mut h = Harness::new();
    h.ok(pointer(0, 4, gl::FLOAT, 0, 0));
    assert_eq!(h.error(), gl::INVALID_VALUE);
}

#[test]
fn test_pointer_validation() {
    let mut h = Harness::new();
    array_buffer(&mut h, 1);

    h.ok(pointer(0, 5, gl::FLOAT, 0, 0));
    assert_eq!(h.error(), gl::INVALID_VALUE);
    h.ok(pointer(0, 4, gl::TEXTURE_2D, 0, 0));
    assert_eq!(h.error(), gl::INVALID_ENUM);
    h.ok(pointer(0, 4, gl::FLOAT, 256, 0));
    assert_eq!(h.error(), gl::INVALID_VALUE);
    h.ok(pointer(0, 4, gl::FLOAT, 0, 2));
    assert_eq!(h.error(), gl::INVALID_OPERATION);
    h.ok(pointer(0, 4, gl::FLOAT, 6, 0));
    assert_eq!(h.error(), gl::INVALID_OPERATION);

    h.ok(pointer(0, 4, gl::FLOAT, 16, 4));
    assert_eq!(h.error(), gl::NO_ERROR);
    let attrib = h.decoder.vertex.default.attrib(0).unwrap();
    assert_eq!(attrib.real_stride(), 16);
    assert_eq!(attrib.offset(), 4);
    assert!(attrib.buffer().is_some());
}

#[test]
fn test_vertex_attrib_4f_is_mirrored() {
    let mut h = Harness::new();
    h.ok(VertexAttrib4f { index: 2, x: 1.0, y: 2.0, z: 3.0, w: 4.0 });
    assert_eq!(h.decoder.state.attrib_values[2].to_array(), [1.0, 2.0, 3.0, 4.0]);
    assert!(h.called("vertex_attrib_4f 2 [1.0, 2.0, 3.0, 4.0]"));

    h.ok(VertexAttrib4f { index: 99, x: 0.0, y: 0.0, z: 0.0, w: 0.0 });
    assert_eq!(h.error(), gl::INVALID_VALUE);
}

// ============================================================================
// VERTEX ARRAY OBJECTS
// ============================================================================

#[test]
fn test_vertex_array_exists_after_first_bind() {
    let mut h = Harness::new();
    assert!(h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());

    h.ok(IsVertexArrayOES { array: 3, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 0);

    h.ok(BindVertexArrayOES { array: 3 });
    h.ok(IsVertexArrayOES { array: 3, result_shm_id: SHM, result_shm_offset: 0 });
    assert_eq!(h.read_u32(0), 1);
}

#[test]
fn test_gen_vertex_arrays_rejects_duplicates() {
    let mut h = Harness::new();
    assert!(h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());
    assert_eq!(
        h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]),
        Err(CommandError::InvalidArguments)
    );
}

#[test]
fn test_bind_unknown_vertex_array() {
    let mut h = Harness::new();
    h.ok(BindVertexArrayOES { array: 8 });
    assert_eq!(h.error(), gl::INVALID_OPERATION);
}

#[test]
fn test_bound_array_owns_attribute_state() {
    let mut h = Harness::new();
    array_buffer(&mut h, 1);
    assert!(h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());
    h.ok(BindVertexArrayOES { array: 3 });
    h.ok(pointer(1, 2, gl::FLOAT, 0, 0));
    h.ok(EnableVertexAttribArray { index: 1 });

    assert!(!h.decoder.vertex.default.attrib(1).unwrap().enabled());
    let key = h.decoder.state.vertex_array.unwrap();
    let array = h.decoder.vertex.manager.vertex_array(key).unwrap();
    assert!(array.attrib(1).unwrap().enabled());
    assert_eq!(array.attrib(1).unwrap().size(), 2);
}

#[test]
fn test_emulated_bind_replays_attribute_state() {
    let mut h = Harness::new();
    array_buffer(&mut h, 1);
    assert!(h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());
    h.ok(BindVertexArrayOES { array: 3 });
    h.ok(pointer(1, 2, gl::FLOAT, 0, 0));
    h.ok(EnableVertexAttribArray { index: 1 });

    h.ok(BindVertexArrayOES { array: 0 });
    h.clear_calls();
    h.ok(BindVertexArrayOES { array: 3 });
    assert!(h.count("vertex_attrib_pointer 1") >= 1);
    assert!(h.called("enable_vertex_attrib_array 1"));
    assert_eq!(h.count("bind_vertex_array"), 0);
}

#[test]
fn test_delete_bound_vertex_array_falls_back_to_default() {
    let mut h = Harness::new();
    array_buffer(&mut h, 1);
    assert!(h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());
    h.ok(BindVertexArrayOES { array: 3 });
    h.ok(pointer(0, 4, gl::FLOAT, 0, 0));

    assert!(h.run_with(DeleteVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());
    assert!(h.decoder.state.vertex_array.is_none());
    assert!(h.decoder.vertex.manager.is_empty());
}

#[test]
fn test_element_array_binding_is_per_vertex_array() {
    let mut h = Harness::new();
    h.gen_buffer(2);
    h.ok(BindBuffer { target: gl::ELEMENT_ARRAY_BUFFER, buffer: 2 });
    assert!(h.run_with(GenVertexArraysOESImmediate { n: 1 }, &[3]).is_ok());
    h.ok(BindVertexArrayOES { array: 3 });

    h.write_u32(0, 0);
    h.ok(GetIntegerv { pname: gl::ELEMENT_ARRAY_BUFFER_BINDING, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(h.read_u32(4), 0);

    h.ok(BindVertexArrayOES { array: 0 });
    h.write_u32(0, 0);
    h.ok(GetIntegerv { pname: gl::ELEMENT_ARRAY_BUFFER_BINDING, params_shm_id: SHM, params_shm_offset: 0 });
    assert_eq!(h.read_u32(4), 2);
}
