#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod render {
    use orrery::{
        Vector3,
        data_structures::{
            mesh::{MeshBuffer, Topology},
            scene_graph::{DrawOrder, SceneGraph, SceneNode},
        },
        geometry::{build_normal_overlay, build_origin, build_sphere},
        render::{RenderSettings, Renderer},
        resources::shader::{FLAT_SHADER, LIT_SHADER},
    };

    use crate::common::test_utils::{FRAME, builtin_shaders, center, headless, pixel, read_pixels};

    #[test]
    fn empty_scene_renders_the_clear_colour() {
        let gpu = headless();
        let renderer = Renderer::new(RenderSettings {
            clear_colour: wgpu::Color::WHITE,
            ..Default::default()
        });
        let (target, draws) = renderer.render_offscreen(&gpu, &SceneGraph::default(), FRAME);
        assert_eq!(draws, 0);
        let pixels = read_pixels(&gpu, &target);
        assert!(pixels.iter().all(|p| *p == [255, 255, 255, 255]));
    }

    #[test]
    fn sphere_at_origin_covers_the_center() {
        let gpu = headless();
        let shaders = builtin_shaders(&gpu);
        let mut sun = SceneNode::new("sun");
        sun.set_mesh(&gpu, &build_sphere(4, 0.75, Vector3::new(1.0, 1.0, 0.0)));
        sun.set_shader(&gpu, shaders.get(FLAT_SHADER).unwrap());
        let mut graph = SceneGraph::default();
        graph.add_root(sun);

        let (target, draws) = Renderer::default().render_offscreen(&gpu, &graph, FRAME);
        assert_eq!(draws, 1);
        let pixels = read_pixels(&gpu, &target);
        let [r, g, b, _] = center(&pixels);
        assert!(r > 200 && g > 200 && b < 50, "center pixel was {:?}", center(&pixels));
        assert_eq!(pixel(&pixels, 0, 0), pixel(&pixels, FRAME[0] - 1, FRAME[1] - 1));
        assert_ne!(pixel(&pixels, 0, 0), center(&pixels));
    }

    #[test]
    fn lit_sphere_is_shaded() {
        let gpu = headless();
        let shaders = builtin_shaders(&gpu);
        let mut sun = SceneNode::new("sun");
        sun.set_mesh(&gpu, &build_sphere(4, 0.75, Vector3::new(1.0, 1.0, 1.0)));
        sun.set_shader(&gpu, shaders.get(LIT_SHADER).unwrap());
        let mut graph = SceneGraph::default();
        graph.add_root(sun);

        let (target, _) = Renderer::default().render_offscreen(&gpu, &graph, FRAME);
        let pixels = read_pixels(&gpu, &target);
        // facing the view-space light, brighter than the ambient term alone
        let [r, _, _, _] = center(&pixels);
        assert!(r > 150, "center pixel was {:?}", center(&pixels));
    }

    #[test]
    fn null_nodes_are_skipped_while_siblings_draw() {
        let gpu = headless();
        let shaders = builtin_shaders(&gpu);
        let mut root = SceneNode::new("root");
        let mut broken = SceneNode::new("broken");
        broken.set_mesh(&gpu, &MeshBuffer::new(Topology::Triangles));
        broken.set_shader(&gpu, shaders.get(LIT_SHADER).unwrap());
        let mut axis = SceneNode::new("axis");
        axis.set_mesh(&gpu, &build_origin());
        axis.set_shader(&gpu, shaders.get(FLAT_SHADER).unwrap());
        root.add_child(broken);
        let axis_id = root.add_child(axis);

        let mut graph = SceneGraph::default();
        graph.add_root(root);
        let draws: Vec<_> = graph
            .draw_list(DrawOrder::default())
            .iter()
            .map(|visit| visit.node.id())
            .collect();
        assert_eq!(draws, vec![axis_id]);

        let (_, count) = Renderer::default().render_offscreen(&gpu, &graph, FRAME);
        assert_eq!(count, 1);
    }

    #[test]
    fn removed_subtree_is_no_longer_drawn() {
        let gpu = headless();
        let shaders = builtin_shaders(&gpu);
        let lit = shaders.get(LIT_SHADER).unwrap();
        let flat = shaders.get(FLAT_SHADER).unwrap();

        let sun_mesh = build_sphere(3, 0.75, Vector3::new(1.0, 1.0, 0.0));
        let mut sun = SceneNode::new("sun");
        sun.set_mesh(&gpu, &sun_mesh);
        sun.set_shader(&gpu, lit.clone());

        let mut planet = SceneNode::new("planet").with_position(Vector3::new(2.5, 0.0, 0.0));
        planet.set_mesh(&gpu, &build_sphere(2, 0.4, Vector3::new(0.8, 0.2, 0.2)));
        planet.set_shader(&gpu, lit.clone());
        let mut moon = SceneNode::new("moon").with_position(Vector3::new(1.0, 0.0, 0.0));
        moon.set_mesh(&gpu, &build_sphere(1, 0.25, Vector3::new(0.2, 0.2, 0.8)));
        moon.set_shader(&gpu, lit);
        planet.add_child(moon);
        let planet_id = sun.add_child(planet);

        let mut normals = SceneNode::new("normals");
        normals.set_mesh(&gpu, &build_normal_overlay(&sun_mesh, 0.1, Vector3::new(1.0, 1.0, 0.0)));
        normals.set_shader(&gpu, flat);
        let normals_id = sun.add_child(normals);

        let mut graph = SceneGraph::default();
        let sun_id = graph.add_root(sun);
        let renderer = Renderer::default();
        assert_eq!(renderer.render_offscreen(&gpu, &graph, FRAME).1, 4);

        let sun = graph.node_mut(sun_id).unwrap();
        assert!(sun.has_child(normals_id));
        drop(sun.remove_child(normals_id));
        assert!(!sun.has_child(normals_id));
        assert_eq!(renderer.render_offscreen(&gpu, &graph, FRAME).1, 3);

        drop(graph.node_mut(sun_id).unwrap().remove_child(planet_id));
        assert_eq!(renderer.render_offscreen(&gpu, &graph, FRAME).1, 1);
    }

    #[test]
    fn wireframe_bindings_render_where_supported() {
        let mut gpu = headless();
        gpu.set_wireframe(true);
        assert_eq!(gpu.wireframe(), gpu.supports_wireframe());

        let shaders = builtin_shaders(&gpu);
        let mut sun = SceneNode::new("sun");
        sun.set_mesh(&gpu, &build_sphere(2, 0.75, Vector3::new(1.0, 1.0, 0.0)));
        sun.set_shader(&gpu, shaders.get(LIT_SHADER).unwrap());
        let mut graph = SceneGraph::default();
        graph.add_root(sun);
        assert_eq!(Renderer::default().render_offscreen(&gpu, &graph, FRAME).1, 1);
    }
}
