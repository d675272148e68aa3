use super::*;
use crate::driver::mock_driver::MockDriver;

fn buffer_with_size(buffers: &mut BufferManager, client_id: u32, size: usize) -> BufferKey {
    let key = buffers.create_buffer(client_id, client_id + 100);
    buffers.set_target(key, gl::ARRAY_BUFFER);
    buffers.set_info(key, size, gl::STATIC_DRAW, None);
    key
}

// ============================================================================
// ACCESS CHECKS
// ============================================================================

#[test]
fn test_can_access_checks_last_vertex() {
    let mut buffers = BufferManager::new();
    let key = buffer_with_size(&mut buffers, 1, 48);
    let mut attribs = VertexAttribManager::new(0, 8);
    // vec3 floats, tightly packed: 12 bytes per vertex
    attribs.set_attrib_info(0, Some(key), 3, gl::FLOAT, false, 0, 0, &mut buffers, None);
    let attrib = attribs.attrib(0).unwrap();
    assert_eq!(attrib.real_stride(), 12);
    assert!(attrib.can_access(&buffers, 3));
    assert!(!attrib.can_access(&buffers, 4));
}

#[test]
fn test_can_access_with_stride_and_offset() {
    let mut buffers = BufferManager::new();
    let key = buffer_with_size(&mut buffers, 1, 64);
    let mut attribs = VertexAttribManager::new(0, 8);
    attribs.set_attrib_info(1, Some(key), 2, gl::FLOAT, false, 20, 8, &mut buffers, None);
    let attrib = attribs.attrib(1).unwrap();
    // 8 + 20 * 2 + 8 = 56
    assert!(attrib.can_access(&buffers, 2));
    assert!(!attrib.can_access(&buffers, 3));
    assert!(!attrib.can_access(&buffers, u32::MAX));
}

#[test]
fn test_attrib_without_buffer_is_inaccessible() {
    let buffers = BufferManager::new();
    let attribs = VertexAttribManager::new(0, 8);
    assert!(!attribs.attrib(0).unwrap().can_access(&buffers, 0));
    assert!(attribs.attrib(8).is_none());
}

// ============================================================================
// BUFFER REFERENCES
// ============================================================================

#[test]
fn test_attrib_keeps_deleted_buffer_alive() {
    let mut driver = MockDriver::new();
    let mut buffers = BufferManager::new();
    let key = buffer_with_size(&mut buffers, 1, 16);
    let mut attribs = VertexAttribManager::new(0, 8);
    attribs.set_attrib_info(0, Some(key), 4, gl::FLOAT, false, 0, 0, &mut buffers, None);

    buffers.remove_buffer(1, Some(&mut driver));
    assert!(!buffers.is_buffer(1));
    assert!(buffers.buffer(key).is_some());
    assert_eq!(driver.count("delete_buffer"), 0);

    attribs.release_buffers(&mut buffers, Some(&mut driver));
    assert!(driver.called("delete_buffer 101"));
}

#[test]
fn test_unbind_buffer_clears_every_binding() {
    let mut buffers = BufferManager::new();
    let key = buffer_with_size(&mut buffers, 1, 16);
    let mut attribs = VertexAttribManager::new(0, 8);
    attribs.set_attrib_info(0, Some(key), 4, gl::FLOAT, false, 0, 0, &mut buffers, None);
    attribs.set_attrib_info(2, Some(key), 4, gl::FLOAT, false, 0, 0, &mut buffers, None);
    attribs.set_element_array_buffer(Some(key), &mut buffers, None);

    attribs.unbind_buffer(key, &mut buffers, None);
    assert!(attribs.attribs().iter().all(|a| a.buffer().is_none()));
    assert!(attribs.element_array_buffer().is_none());
    assert!(buffers.is_buffer(1));
}

#[test]
fn test_fixed_attrib_count_follows_enable() {
    let mut buffers = BufferManager::new();
    let key = buffer_with_size(&mut buffers, 1, 16);
    let mut attribs = VertexAttribManager::new(0, 8);
    attribs.set_attrib_info(0, Some(key), 2, gl::FIXED, false, 0, 0, &mut buffers, None);
    assert!(!attribs.have_fixed_attribs());
    attribs.enable(0, true);
    assert!(attribs.have_fixed_attribs());
    attribs.set_attrib_info(0, Some(key), 2, gl::FLOAT, false, 0, 0, &mut buffers, None);
    assert!(!attribs.have_fixed_attribs());
}

#[test]
fn test_get_parameter_reports_client_buffer() {
    let mut buffers = BufferManager::new();
    let key = buffer_with_size(&mut buffers, 7, 16);
    let mut attribs = VertexAttribManager::new(0, 8);
    attribs.set_attrib_info(0, Some(key), 2, gl::FLOAT, true, 8, 0, &mut buffers, None);
    let attrib = attribs.attrib(0).unwrap();
    assert_eq!(attrib.get_parameter(gl::VERTEX_ATTRIB_ARRAY_BUFFER_BINDING, &buffers), Some(7));
    assert_eq!(attrib.get_parameter(gl::VERTEX_ATTRIB_ARRAY_NORMALIZED, &buffers), Some(1));
    assert_eq!(attrib.get_parameter(gl::VERTEX_ATTRIB_ARRAY_STRIDE, &buffers), Some(8));
}

// ============================================================================
// VERTEX ARRAY OBJECTS
// ============================================================================

#[test]
fn test_vertex_array_lifecycle() {
    let mut driver = MockDriver::new();
    let mut buffers = BufferManager::new();
    let buffer = buffer_with_size(&mut buffers, 1, 16);
    let mut arrays = VertexArrayManager::new(8);
    let key = arrays.create_vertex_array(3, 30);
    assert!(!arrays.is_vertex_array(3));
    arrays.vertex_array_mut(key).unwrap().mark_as_bound();
    assert!(arrays.is_vertex_array(3));

    arrays
        .vertex_array_mut(key)
        .unwrap()
        .set_element_array_buffer(Some(buffer), &mut buffers, None);
    buffers.remove_buffer(1, Some(&mut driver));
    arrays.remove_vertex_array(3, &mut buffers, Some(&mut driver));
    assert!(driver.called("delete_vertex_array 30"));
    assert!(driver.called("delete_buffer 101"));
    assert!(arrays.is_empty());
}
