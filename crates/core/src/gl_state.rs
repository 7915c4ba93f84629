//! Host GL state capture and restore
//!
//! Every overlay pass runs between a capture and a restore so the host's next
//! draw call sees exactly the pipeline it left behind.

use std::num::NonZeroU32;

use bitflags::bitflags;
use glow::HasContext;

bitflags! {
    /// Server-side capabilities toggled by the overlay renderer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlCapabilities: u8 {
        const BLEND = 1 << 0;
        const CULL_FACE = 1 << 1;
        const DEPTH_TEST = 1 << 2;
        const SCISSOR_TEST = 1 << 3;
    }
}

/// Each flag with its GL enum, in restore order
const CAPABILITIES: [(GlCapabilities, u32); 4] = [
    (GlCapabilities::BLEND, glow::BLEND),
    (GlCapabilities::CULL_FACE, glow::CULL_FACE),
    (GlCapabilities::DEPTH_TEST, glow::DEPTH_TEST),
    (GlCapabilities::SCISSOR_TEST, glow::SCISSOR_TEST),
];

/// The slice of the GL API the guard reads and writes
///
/// Object names are raw `u32`s with 0 meaning "unbound".
pub trait GlStateAccess {
    fn get_i32(&self, pname: u32) -> i32;
    fn get_rect(&self, pname: u32) -> [i32; 4];
    fn is_enabled(&self, cap: u32) -> bool;

    fn use_program(&self, program: u32);
    fn active_texture(&self, unit: u32);
    fn bind_texture_2d(&self, texture: u32);
    fn bind_buffer(&self, target: u32, buffer: u32);
    fn bind_vertex_array(&self, vao: u32);
    fn bind_framebuffer(&self, framebuffer: u32);
    fn viewport(&self, rect: [i32; 4]);
    fn scissor(&self, rect: [i32; 4]);
    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);
    fn blend_equation_separate(&self, rgb: u32, alpha: u32);
    fn unpack_alignment(&self, alignment: i32);
    fn set_enabled(&self, cap: u32, enabled: bool);
}

/// Snapshot of every field the overlay can disturb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedGlState {
    pub program: u32,
    pub active_texture: u32,
    pub texture_2d: u32,
    /// `TEXTURE_BINDING_2D` of unit 0 when another unit was active
    pub texture_unit0: Option<u32>,
    pub array_buffer: u32,
    pub element_array_buffer: u32,
    pub vertex_array: u32,
    pub framebuffer: u32,
    pub viewport: [i32; 4],
    pub scissor_box: [i32; 4],
    /// src rgb, dst rgb, src alpha, dst alpha
    pub blend_func: [u32; 4],
    /// rgb, alpha
    pub blend_equation: [u32; 2],
    pub unpack_alignment: i32,
    pub enabled: GlCapabilities,
}

impl CapturedGlState {
    /// Read the current state
    ///
    /// When a unit other than 0 is active, unit 0's binding is read by
    /// switching to it and back, leaving the active unit unchanged.
    pub fn capture<G: GlStateAccess + ?Sized>(gl: &G) -> Self {
        let name = |pname| gl.get_i32(pname) as u32;

        let active_texture = name(glow::ACTIVE_TEXTURE);
        let texture_2d = name(glow::TEXTURE_BINDING_2D);
        let texture_unit0 = if active_texture != glow::TEXTURE0 {
            gl.active_texture(glow::TEXTURE0);
            let unit0 = name(glow::TEXTURE_BINDING_2D);
            gl.active_texture(active_texture);
            Some(unit0)
        } else {
            None
        };

        let mut enabled = GlCapabilities::empty();
        for (flag, cap) in CAPABILITIES {
            if gl.is_enabled(cap) {
                enabled |= flag;
            }
        }

        Self {
            program: name(glow::CURRENT_PROGRAM),
            active_texture,
            texture_2d,
            texture_unit0,
            array_buffer: name(glow::ARRAY_BUFFER_BINDING),
            element_array_buffer: name(glow::ELEMENT_ARRAY_BUFFER_BINDING),
            vertex_array: name(glow::VERTEX_ARRAY_BINDING),
            framebuffer: name(glow::FRAMEBUFFER_BINDING),
            viewport: gl.get_rect(glow::VIEWPORT),
            scissor_box: gl.get_rect(glow::SCISSOR_BOX),
            blend_func: [
                name(glow::BLEND_SRC_RGB),
                name(glow::BLEND_DST_RGB),
                name(glow::BLEND_SRC_ALPHA),
                name(glow::BLEND_DST_ALPHA),
            ],
            blend_equation: [name(glow::BLEND_EQUATION_RGB), name(glow::BLEND_EQUATION_ALPHA)],
            unpack_alignment: gl.get_i32(glow::UNPACK_ALIGNMENT),
            enabled,
        }
    }

    /// Write every captured field back
    ///
    /// Order: program, active texture unit, texture binding, buffer bindings,
    /// vertex array, framebuffer, viewport, scissor box, blend state, then
    /// the capability flags.
    pub fn restore<G: GlStateAccess + ?Sized>(&self, gl: &G) {
        gl.use_program(self.program);

        if let Some(unit0) = self.texture_unit0 {
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture_2d(unit0);
        }
        gl.active_texture(self.active_texture);
        gl.bind_texture_2d(self.texture_2d);

        gl.bind_buffer(glow::ARRAY_BUFFER, self.array_buffer);
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, self.element_array_buffer);
        gl.bind_vertex_array(self.vertex_array);
        gl.bind_framebuffer(self.framebuffer);

        gl.viewport(self.viewport);
        gl.scissor(self.scissor_box);

        let [src_rgb, dst_rgb, src_alpha, dst_alpha] = self.blend_func;
        gl.blend_func_separate(src_rgb, dst_rgb, src_alpha, dst_alpha);
        gl.blend_equation_separate(self.blend_equation[0], self.blend_equation[1]);
        gl.unpack_alignment(self.unpack_alignment);

        for (flag, cap) in CAPABILITIES {
            gl.set_enabled(cap, self.enabled.contains(flag));
        }
    }
}

/// Restores the captured state when dropped, including during unwinding
pub struct GlStateGuard<'a, G: GlStateAccess + ?Sized> {
    gl: &'a G,
    saved: CapturedGlState,
}

impl<'a, G: GlStateAccess + ?Sized> GlStateGuard<'a, G> {
    pub fn new(gl: &'a G) -> Self {
        Self {
            saved: CapturedGlState::capture(gl),
            gl,
        }
    }

    pub fn saved(&self) -> &CapturedGlState {
        &self.saved
    }
}

impl<G: GlStateAccess + ?Sized> Drop for GlStateGuard<'_, G> {
    fn drop(&mut self) {
        self.saved.restore(self.gl);
    }
}

fn object(name: u32) -> Option<NonZeroU32> {
    NonZeroU32::new(name)
}

impl GlStateAccess for glow::Context {
    fn get_i32(&self, pname: u32) -> i32 {
        unsafe { self.get_parameter_i32(pname) }
    }

    fn get_rect(&self, pname: u32) -> [i32; 4] {
        let mut rect = [0; 4];
        unsafe { self.get_parameter_i32_slice(pname, &mut rect) };
        rect
    }

    fn is_enabled(&self, cap: u32) -> bool {
        unsafe { HasContext::is_enabled(self, cap) }
    }

    fn use_program(&self, program: u32) {
        unsafe { HasContext::use_program(self, object(program).map(glow::NativeProgram)) }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { HasContext::active_texture(self, unit) }
    }

    fn bind_texture_2d(&self, texture: u32) {
        unsafe { self.bind_texture(glow::TEXTURE_2D, object(texture).map(glow::NativeTexture)) }
    }

    fn bind_buffer(&self, target: u32, buffer: u32) {
        unsafe { HasContext::bind_buffer(self, target, object(buffer).map(glow::NativeBuffer)) }
    }

    fn bind_vertex_array(&self, vao: u32) {
        unsafe { HasContext::bind_vertex_array(self, object(vao).map(glow::NativeVertexArray)) }
    }

    fn bind_framebuffer(&self, framebuffer: u32) {
        unsafe {
            HasContext::bind_framebuffer(
                self,
                glow::FRAMEBUFFER,
                object(framebuffer).map(glow::NativeFramebuffer),
            )
        }
    }

    fn viewport(&self, [x, y, w, h]: [i32; 4]) {
        unsafe { HasContext::viewport(self, x, y, w, h) }
    }

    fn scissor(&self, [x, y, w, h]: [i32; 4]) {
        unsafe { HasContext::scissor(self, x, y, w, h) }
    }

    fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        unsafe { HasContext::blend_func_separate(self, src_rgb, dst_rgb, src_alpha, dst_alpha) }
    }

    fn blend_equation_separate(&self, rgb: u32, alpha: u32) {
        unsafe { HasContext::blend_equation_separate(self, rgb, alpha) }
    }

    fn unpack_alignment(&self, alignment: i32) {
        unsafe { self.pixel_store_i32(glow::UNPACK_ALIGNMENT, alignment) }
    }

    fn set_enabled(&self, cap: u32, enabled: bool) {
        unsafe {
            if enabled {
                self.enable(cap);
            } else {
                self.disable(cap);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory GL state machine covering what the guard touches
    #[derive(Default)]
    pub(crate) struct FakeGl {
        pub state: RefCell<FakeState>,
        pub calls: RefCell<Vec<&'static str>>,
    }

    #[derive(Clone, Default, PartialEq, Debug)]
    pub(crate) struct FakeState {
        ints: HashMap<u32, i32>,
        rects: HashMap<u32, [i32; 4]>,
        caps: HashMap<u32, bool>,
        unit_textures: HashMap<u32, i32>,
    }

    impl FakeGl {
        pub(crate) fn with_host_state() -> Self {
            let gl = Self::default();
            {
                let mut s = gl.state.borrow_mut();
                s.ints.insert(glow::CURRENT_PROGRAM, 7);
                s.ints.insert(glow::ACTIVE_TEXTURE, glow::TEXTURE0 as i32 + 2);
                s.unit_textures.insert(glow::TEXTURE0, 11);
                s.unit_textures.insert(glow::TEXTURE0 + 2, 12);
                s.ints.insert(glow::ARRAY_BUFFER_BINDING, 3);
                s.ints.insert(glow::ELEMENT_ARRAY_BUFFER_BINDING, 4);
                s.ints.insert(glow::VERTEX_ARRAY_BINDING, 5);
                s.ints.insert(glow::FRAMEBUFFER_BINDING, 6);
                s.ints.insert(glow::BLEND_SRC_RGB, glow::SRC_ALPHA as i32);
                s.ints.insert(glow::BLEND_DST_RGB, glow::ONE_MINUS_SRC_ALPHA as i32);
                s.ints.insert(glow::BLEND_SRC_ALPHA, glow::ONE as i32);
                s.ints.insert(glow::BLEND_DST_ALPHA, glow::ZERO as i32);
                s.ints.insert(glow::BLEND_EQUATION_RGB, glow::FUNC_ADD as i32);
                s.ints.insert(glow::BLEND_EQUATION_ALPHA, glow::MAX as i32);
                s.ints.insert(glow::UNPACK_ALIGNMENT, 4);
                s.rects.insert(glow::VIEWPORT, [0, 0, 1920, 1080]);
                s.rects.insert(glow::SCISSOR_BOX, [10, 20, 300, 400]);
                s.caps.insert(glow::BLEND, false);
                s.caps.insert(glow::CULL_FACE, true);
                s.caps.insert(glow::DEPTH_TEST, true);
                s.caps.insert(glow::SCISSOR_TEST, false);
            }
            gl
        }

        pub(crate) fn snapshot(&self) -> FakeState {
            self.state.borrow().clone()
        }

        fn active_unit(&self) -> u32 {
            self.state
                .borrow()
                .ints
                .get(&glow::ACTIVE_TEXTURE)
                .copied()
                .unwrap_or(glow::TEXTURE0 as i32) as u32
        }

        fn set(&self, pname: u32, value: i32, call: &'static str) {
            self.state.borrow_mut().ints.insert(pname, value);
            self.calls.borrow_mut().push(call);
        }

        /// What a UI renderer does to the pipeline
        pub(crate) fn scribble(&self) {
            self.use_program(99);
            self.active_texture(glow::TEXTURE0);
            self.bind_texture_2d(98);
            self.bind_buffer(glow::ARRAY_BUFFER, 97);
            self.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, 96);
            self.bind_vertex_array(95);
            self.bind_framebuffer(0);
            self.viewport([0, 0, 1, 1]);
            self.scissor([5, 5, 5, 5]);
            self.blend_func_separate(glow::ONE, glow::ONE_MINUS_SRC_ALPHA, glow::ONE_MINUS_DST_ALPHA, glow::ONE);
            self.blend_equation_separate(glow::FUNC_ADD, glow::FUNC_ADD);
            self.unpack_alignment(1);
            self.set_enabled(glow::BLEND, true);
            self.set_enabled(glow::CULL_FACE, false);
            self.set_enabled(glow::DEPTH_TEST, false);
            self.set_enabled(glow::SCISSOR_TEST, true);
            self.calls.borrow_mut().clear();
        }
    }

    impl GlStateAccess for FakeGl {
        fn get_i32(&self, pname: u32) -> i32 {
            if pname == glow::TEXTURE_BINDING_2D {
                let unit = self.active_unit();
                return self.state.borrow().unit_textures.get(&unit).copied().unwrap_or(0);
            }
            self.state.borrow().ints.get(&pname).copied().unwrap_or(0)
        }

        fn get_rect(&self, pname: u32) -> [i32; 4] {
            self.state.borrow().rects.get(&pname).copied().unwrap_or_default()
        }

        fn is_enabled(&self, cap: u32) -> bool {
            self.state.borrow().caps.get(&cap).copied().unwrap_or(false)
        }

        fn use_program(&self, program: u32) {
            self.set(glow::CURRENT_PROGRAM, program as i32, "program");
        }

        fn active_texture(&self, unit: u32) {
            self.set(glow::ACTIVE_TEXTURE, unit as i32, "active_texture");
        }

        fn bind_texture_2d(&self, texture: u32) {
            let unit = self.active_unit();
            self.state.borrow_mut().unit_textures.insert(unit, texture as i32);
            self.calls.borrow_mut().push("texture");
        }

        fn bind_buffer(&self, target: u32, buffer: u32) {
            let pname = if target == glow::ARRAY_BUFFER {
                glow::ARRAY_BUFFER_BINDING
            } else {
                glow::ELEMENT_ARRAY_BUFFER_BINDING
            };
            self.set(pname, buffer as i32, "buffer");
        }

        fn bind_vertex_array(&self, vao: u32) {
            self.set(glow::VERTEX_ARRAY_BINDING, vao as i32, "vertex_array");
        }

        fn bind_framebuffer(&self, framebuffer: u32) {
            self.set(glow::FRAMEBUFFER_BINDING, framebuffer as i32, "framebuffer");
        }

        fn viewport(&self, rect: [i32; 4]) {
            self.state.borrow_mut().rects.insert(glow::VIEWPORT, rect);
            self.calls.borrow_mut().push("viewport");
        }

        fn scissor(&self, rect: [i32; 4]) {
            self.state.borrow_mut().rects.insert(glow::SCISSOR_BOX, rect);
            self.calls.borrow_mut().push("scissor");
        }

        fn blend_func_separate(&self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
            let mut s = self.state.borrow_mut();
            s.ints.insert(glow::BLEND_SRC_RGB, src_rgb as i32);
            s.ints.insert(glow::BLEND_DST_RGB, dst_rgb as i32);
            s.ints.insert(glow::BLEND_SRC_ALPHA, src_alpha as i32);
            s.ints.insert(glow::BLEND_DST_ALPHA, dst_alpha as i32);
            self.calls.borrow_mut().push("blend_func");
        }

        fn blend_equation_separate(&self, rgb: u32, alpha: u32) {
            let mut s = self.state.borrow_mut();
            s.ints.insert(glow::BLEND_EQUATION_RGB, rgb as i32);
            s.ints.insert(glow::BLEND_EQUATION_ALPHA, alpha as i32);
            self.calls.borrow_mut().push("blend_equation");
        }

        fn unpack_alignment(&self, alignment: i32) {
            self.set(glow::UNPACK_ALIGNMENT, alignment, "unpack_alignment");
        }

        fn set_enabled(&self, cap: u32, enabled: bool) {
            self.state.borrow_mut().caps.insert(cap, enabled);
            self.calls.borrow_mut().push("capability");
        }
    }

    #[test]
    fn test_capture_reads_host_state() {
        let gl = FakeGl::with_host_state();
        let saved = CapturedGlState::capture(&gl);

        assert_eq!(saved.program, 7);
        assert_eq!(saved.active_texture, glow::TEXTURE0 + 2);
        assert_eq!(saved.texture_2d, 12);
        assert_eq!(saved.texture_unit0, Some(11));
        assert_eq!(saved.viewport, [0, 0, 1920, 1080]);
        assert_eq!(saved.enabled, GlCapabilities::CULL_FACE | GlCapabilities::DEPTH_TEST);
    }

    #[test]
    fn test_capture_leaves_state_untouched() {
        let gl = FakeGl::with_host_state();
        let before = gl.snapshot();
        CapturedGlState::capture(&gl);
        assert_eq!(gl.snapshot(), before);
    }

    #[test]
    fn test_restore_after_scribble_is_exact() {
        let gl = FakeGl::with_host_state();
        let before = gl.snapshot();

        let saved = CapturedGlState::capture(&gl);
        gl.scribble();
        assert_ne!(gl.snapshot(), before);

        saved.restore(&gl);
        assert_eq!(gl.snapshot(), before);
        assert_eq!(CapturedGlState::capture(&gl), saved);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let gl = FakeGl::with_host_state();
        let before = gl.snapshot();
        {
            let _guard = GlStateGuard::new(&gl);
            gl.scribble();
        }
        assert_eq!(gl.snapshot(), before);
    }

    #[test]
    fn test_restore_order() {
        let gl = FakeGl::with_host_state();
        let saved = CapturedGlState::capture(&gl);
        gl.calls.borrow_mut().clear();

        saved.restore(&gl);

        let mut order: Vec<&str> = gl.calls.borrow().clone();
        order.dedup();
        assert_eq!(
            order,
            vec![
                "program",
                "active_texture",
                "texture",
                "active_texture",
                "texture",
                "buffer",
                "vertex_array",
                "framebuffer",
                "viewport",
                "scissor",
                "blend_func",
                "blend_equation",
                "unpack_alignment",
                "capability",
            ]
        );
    }
}
