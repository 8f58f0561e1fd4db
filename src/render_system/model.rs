use super::{geometry::GeometryBuffer, obj_loader::Material, texture::TextureHandle};

use nalgebra_glm::{identity, rotate_normalized_axis, scale, translate, vec3, TMat4, TVec3};

/// Which lit-pass program an object is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Phong shading with shadow lookup.
    Lit,
    /// Flat light colour; used for the light marker.
    Emissive,
}

/// One uploaded mesh together with the material it was loaded with.
pub struct RenderPart {
    pub geometry: GeometryBuffer,
    pub material: Material,
    pub texture: TextureHandle,
}

///
/// Position, per-axis scale and yaw about +Y. The model matrix is rebuilt
/// lazily the first time it is asked for after a mutation.
///
#[derive(Debug, Clone)]
pub struct Transform {
    position: TVec3<f32>,
    scale: TVec3<f32>,
    yaw: f32,
    model: TMat4<f32>,
    requires_update: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position: vec3(0.0, 0.0, 0.0),
            scale: vec3(1.0, 1.0, 1.0),
            yaw: 0.0,
            model: identity(),
            requires_update: false,
        }
    }
}

impl Transform {
    pub fn model_matrix(&mut self) -> TMat4<f32> {
        if self.requires_update {
            self.model = translate(&identity(), &self.position);
            self.model = rotate_normalized_axis(&self.model, self.yaw, &vec3(0.0, 1.0, 0.0));
            self.model = scale(&self.model, &self.scale);
            self.requires_update = false;
        }
        self.model
    }

    pub fn position(&self) -> TVec3<f32> {
        self.position
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn scale_factors(&self) -> TVec3<f32> {
        self.scale
    }

    pub fn translate(&mut self, v: TVec3<f32>) {
        self.position += v;
        self.requires_update = true;
    }

    pub fn set_position(&mut self, v: TVec3<f32>) {
        self.position = v;
        self.requires_update = true;
    }

    pub fn rotate(&mut self, radians: f32) {
        self.yaw = (self.yaw + radians) % std::f32::consts::TAU;
        self.requires_update = true;
    }

    pub fn set_yaw(&mut self, radians: f32) {
        self.yaw = radians % std::f32::consts::TAU;
        self.requires_update = true;
    }

    /// Multiplies every axis by `factor`, never letting an axis collapse below `min`.
    pub fn scale_by(&mut self, factor: f32, min: f32) {
        self.scale = (self.scale * factor).map(|s| s.max(min));
        self.requires_update = true;
    }

    pub fn set_scale(&mut self, v: TVec3<f32>) {
        self.scale = v;
        self.requires_update = true;
    }
}

pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    parts: Vec<RenderPart>,
    program: ProgramKind,
    casts_shadow: bool,
}

pub struct SceneObjectBuilder {
    name: String,
    parts: Vec<RenderPart>,
    transform: Transform,
    program: ProgramKind,
    casts_shadow: bool,
}

impl SceneObjectBuilder {
    fn new(name: String, parts: Vec<RenderPart>) -> SceneObjectBuilder {
        SceneObjectBuilder {
            name,
            parts,
            transform: Transform::default(),
            program: ProgramKind::Lit,
            casts_shadow: true,
        }
    }

    pub fn build(self) -> SceneObject {
        SceneObject {
            name: self.name,
            transform: self.transform,
            parts: self.parts,
            program: self.program,
            casts_shadow: self.casts_shadow,
        }
    }

    pub fn position(mut self, position: TVec3<f32>) -> SceneObjectBuilder {
        self.transform.set_position(position);
        self
    }

    pub fn uniform_scale_factor(mut self, factor: f32) -> SceneObjectBuilder {
        self.transform.set_scale(vec3(factor, factor, factor));
        self
    }

    pub fn program(mut self, program: ProgramKind) -> SceneObjectBuilder {
        self.program = program;
        self
    }

    pub fn casts_shadow(mut self, casts_shadow: bool) -> SceneObjectBuilder {
        self.casts_shadow = casts_shadow;
        self
    }
}

impl SceneObject {
    pub fn new(name: &str, parts: Vec<RenderPart>) -> SceneObjectBuilder {
        SceneObjectBuilder::new(name.into(), parts)
    }

    pub fn parts(&self) -> &[RenderPart] {
        &self.parts
    }

    pub fn program(&self) -> ProgramKind {
        self.program
    }

    pub fn casts_shadow(&self) -> bool {
        self.casts_shadow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_glm::{half_pi, vec4};

    fn apply(m: &TMat4<f32>, p: TVec3<f32>) -> TVec3<f32> {
        let v = m * vec4(p.x, p.y, p.z, 1.0);
        vec3(v.x, v.y, v.z)
    }

    fn close(a: TVec3<f32>, b: TVec3<f32>) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn untouched_transform_is_identity() {
        let mut transform = Transform::default();
        assert_eq!(transform.model_matrix(), identity());
    }

    #[test]
    fn scale_then_rotate_then_translate() {
        let mut transform = Transform::default();
        transform.set_scale(vec3(2.0, 2.0, 2.0));
        transform.rotate(half_pi());
        transform.translate(vec3(1.0, 0.0, 0.0));

        // +X scaled to 2, yawed a quarter turn onto -Z, then moved +1 on X.
        let p = apply(&transform.model_matrix(), vec3(1.0, 0.0, 0.0));
        assert!(close(p, vec3(1.0, 0.0, -2.0)), "{p:?}");
    }

    #[test]
    fn matrix_tracks_later_mutations() {
        let mut transform = Transform::default();
        transform.translate(vec3(0.0, 1.0, 0.0));
        let first = transform.model_matrix();
        transform.translate(vec3(0.0, 1.0, 0.0));
        assert_ne!(first, transform.model_matrix());
        assert!(close(transform.position(), vec3(0.0, 2.0, 0.0)));
    }

    #[test]
    fn scale_is_floored() {
        let mut transform = Transform::default();
        for _ in 0..100 {
            transform.scale_by(0.5, 0.1);
        }
        assert!(close(transform.scale_factors(), vec3(0.1, 0.1, 0.1)));
    }

    #[test]
    fn yaw_wraps() {
        let mut transform = Transform::default();
        for _ in 0..5 {
            transform.rotate(half_pi());
        }
        assert!((transform.yaw() - half_pi::<f32>()).abs() < 1e-4);
    }

    #[test]
    fn builder_defaults() {
        let object = SceneObject::new("empty", Vec::new())
            .position(vec3(1.0, 2.0, 3.0))
            .uniform_scale_factor(0.2)
            .build();
        assert_eq!(object.program(), ProgramKind::Lit);
        assert!(object.casts_shadow());
        assert!(object.parts().is_empty());
        assert!(close(object.transform.position(), vec3(1.0, 2.0, 3.0)));
    }
}
