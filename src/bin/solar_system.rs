//! A sun with an orbiting planet and two moons, drawn as wireframe where the
//! adapter allows it.
//!
//! Keys: `n` toggles the sun's normals, `l` switches between a light fixed to
//! the camera and one fixed in the world.

use std::rc::Rc;

use orrery::{
    InnerSpace, Vector3,
    context::Context,
    data_structures::{
        mesh::MeshBuffer,
        scene_graph::{LightingSpace, NodeId, SceneGraph, SceneNode},
    },
    flow::{SceneFlow, run},
    geometry::{NORMAL_OVERLAY_COLOR, NORMAL_OVERLAY_LENGTH, build_line, build_normal_overlay, build_origin, build_sphere},
    resources::{
        mesh::GpuMesh,
        shader::{FLAT_SHADER, LIT_SHADER, ShaderProgram, ShaderRegistry},
    },
};
use instant::Duration;
use winit::{event::WindowEvent, keyboard::Key};

const SUN_SPIN: f32 = 36.0;
const PLANET_SPIN: f32 = 90.0;
const PLANET_ORBIT: f32 = 30.0;

#[derive(Default)]
struct SolarSystem {
    sun: Option<NodeId>,
    planet: Option<NodeId>,
    normals: Option<(Rc<GpuMesh>, Rc<ShaderProgram>)>,
    normals_node: Option<NodeId>,
}

fn node(
    ctx: &Context,
    name: &str,
    mesh: &MeshBuffer,
    shader: &Rc<ShaderProgram>,
    position: Vector3<f32>,
) -> SceneNode {
    let mut node = SceneNode::new(name).with_position(position);
    node.set_mesh(&ctx.gpu, mesh);
    node.set_shader(&ctx.gpu, shader.clone());
    node
}

impl SolarSystem {
    fn toggle_normals(&mut self, ctx: &Context, scene: &mut SceneGraph) {
        let (Some(sun_id), Some((mesh, shader))) = (self.sun, &self.normals) else {
            return;
        };
        let Some(sun) = scene.node_mut(sun_id) else {
            return;
        };
        match self.normals_node.take() {
            Some(id) if sun.has_child(id) => {
                sun.remove_child(id);
                log::info!("Normals hidden");
            }
            _ => {
                let mut overlay = SceneNode::new("Sun Normals");
                overlay.set_mesh_resource(&ctx.gpu, mesh.clone());
                overlay.set_shader(&ctx.gpu, shader.clone());
                self.normals_node = Some(sun.add_child(overlay));
                log::info!("Normals shown");
            }
        }
    }
}

impl SceneFlow for SolarSystem {
    fn on_init(&mut self, ctx: &mut Context, scene: &mut SceneGraph) -> anyhow::Result<()> {
        ctx.gpu.set_wireframe(true);

        let shaders = ShaderRegistry::with_builtin(&ctx.gpu)?;
        let lit = shaders.get(LIT_SHADER)?;
        let flat = shaders.get(FLAT_SHADER)?;

        let origin = node(ctx, "Origin", &build_origin(), &flat, Vector3::new(0.0, 0.0, 0.0));

        let sun_mesh = build_sphere(12, 0.75, Vector3::new(1.0, 1.0, 0.0));
        let mut sun = node(ctx, "Sun", &sun_mesh, &lit, Vector3::new(0.0, 0.0, 0.0));
        let mut planet = node(
            ctx,
            "Planet",
            &build_sphere(8, 0.4, Vector3::new(0.8, 0.2, 0.2)),
            &lit,
            Vector3::new(2.5, 0.0, 0.0),
        );

        let moon = build_sphere(6, 0.25, Vector3::new(0.2, 0.2, 0.8));
        let moon1 = node(ctx, "Moon 1", &moon, &lit, Vector3::new(1.0, 0.0, 0.0));
        let mut moon2 = moon1.duplicate(&ctx.gpu).with_position(Vector3::new(-1.0, 0.0, 0.0));
        moon2.debug_name = "Moon 2".to_string();
        planet.add_child(moon1);
        planet.add_child(moon2);

        let up = Vector3::new(0.0, 1.0, 0.0);
        let center = Vector3::new(0.0, 0.0, 0.0);
        let sun_axis = build_line(5.0, up, Vector3::new(1.0, 0.0, 0.0), center);
        let planet_axis = build_line(5.0, up, Vector3::new(1.0, 1.0, 0.0), center);
        sun.add_child(node(ctx, "Sun Axis", &sun_axis, &flat, center));
        planet.add_child(node(ctx, "Planet Axis", &planet_axis, &flat, center));

        self.planet = Some(sun.add_child(planet));
        scene.add_root(origin);
        self.sun = Some(scene.add_root(sun));

        let overlay = build_normal_overlay(&sun_mesh, NORMAL_OVERLAY_LENGTH, NORMAL_OVERLAY_COLOR);
        self.normals = Some((Rc::new(GpuMesh::new(&ctx.gpu, &overlay, "Sun Normals")), flat));

        scene.camera.position = (0.0, 1.0, 4.0).into();
        scene.light_direction = Vector3::new(1.0, 1.0, 1.0).normalize();
        Ok(())
    }

    fn on_update(&mut self, _ctx: &Context, scene: &mut SceneGraph, elapsed: Duration, dt: Duration) {
        let t = elapsed.as_secs_f32();
        let dt = dt.as_secs_f32();
        if let Some(sun) = self.sun.and_then(|id| scene.node_mut(id)) {
            sun.transform.rotation.y += SUN_SPIN * dt;
            sun.transform.position.x = t.cos();
            sun.transform.position.y = t.sin();
        }
        if let Some(planet) = self.planet.and_then(|id| scene.node_mut(id)) {
            planet.transform.rotation.y += PLANET_SPIN * dt;
            planet.rotate_around_origin(PLANET_ORBIT * dt, Vector3::new(0.0, 1.0, 0.0));
        }
    }

    fn on_window_events(&mut self, ctx: &mut Context, scene: &mut SceneGraph, event: &WindowEvent) {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return;
        };
        if !event.state.is_pressed() {
            return;
        }
        if let Some(text) = &event.text {
            log::info!("Pressed key {:?}", text.as_str());
        }
        match &event.logical_key {
            Key::Character(c) if c.as_str() == "n" => self.toggle_normals(ctx, scene),
            Key::Character(c) if c.as_str() == "l" => {
                scene.lighting = match scene.lighting {
                    LightingSpace::View => LightingSpace::World,
                    LightingSpace::World => LightingSpace::View,
                };
                log::info!("Lighting fixed in {:?} space", scene.lighting);
            }
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    run(SolarSystem::default(), "Solar System")
}
