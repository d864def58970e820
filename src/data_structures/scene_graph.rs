//! Scene graph and hierarchical scene organization.
//!
//! A [`SceneNode`] owns its local transform, an optional drawable (mesh resource,
//! shader program and the [`RenderBinding`] joining them) and its children. The
//! [`SceneGraph`] owns the top-level nodes, the camera and the light, and turns
//! the tree into a flat list of draws with accumulated model matrices.

use std::{
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3, Vector4};

use crate::{
    camera::Camera,
    context::DeviceContext,
    data_structures::{mesh::MeshBuffer, transform::Transform},
    pipelines::binding::RenderBinding,
    resources::{mesh::GpuMesh, shader::ShaderProgram},
};

/// Process-unique identity of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether and why a node can be drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Renderability {
    NoMesh,
    NoShader,
    Bound,
    /// Mesh and shader are set but could not be bound.
    Null,
}

#[derive(Debug)]
pub struct SceneNode {
    id: NodeId,
    pub debug_name: String,
    pub transform: Transform,
    /// Multiplies the lighting coefficients of this node's draw.
    pub color: Vector3<f32>,
    mesh: Option<Rc<GpuMesh>>,
    shader: Option<Rc<ShaderProgram>>,
    binding: Option<RenderBinding>,
    children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(debug_name: impl Into<String>) -> Self {
        Self {
            id: NodeId::next(),
            debug_name: debug_name.into(),
            transform: Transform::default(),
            color: Vector3::new(1.0, 1.0, 1.0),
            mesh: None,
            shader: None,
            binding: None,
            children: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.transform.position = position;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Uploads `buffer` as this node's mesh and rebinds against the current shader.
    pub fn set_mesh(&mut self, gpu: &DeviceContext, buffer: &MeshBuffer) {
        let mesh = Rc::new(GpuMesh::new(gpu, buffer, &self.debug_name));
        self.set_mesh_resource(gpu, mesh);
    }

    /// Uses an already uploaded mesh, possibly shared with other nodes.
    pub fn set_mesh_resource(&mut self, gpu: &DeviceContext, mesh: Rc<GpuMesh>) {
        self.mesh = Some(mesh);
        self.rebind(gpu);
    }

    pub fn set_shader(&mut self, gpu: &DeviceContext, shader: Rc<ShaderProgram>) {
        self.shader = Some(shader);
        self.rebind(gpu);
    }

    pub fn mesh(&self) -> Option<&Rc<GpuMesh>> {
        self.mesh.as_ref()
    }

    pub fn shader(&self) -> Option<&Rc<ShaderProgram>> {
        self.shader.as_ref()
    }

    pub fn binding(&self) -> Option<&RenderBinding> {
        self.binding.as_ref()
    }

    pub fn renderability(&self) -> Renderability {
        match (&self.mesh, &self.shader, &self.binding) {
            (None, _, _) => Renderability::NoMesh,
            (Some(_), None, _) => Renderability::NoShader,
            (Some(_), Some(_), Some(_)) => Renderability::Bound,
            (Some(_), Some(_), None) => Renderability::Null,
        }
    }

    /// Drops the current binding, then builds a new one if mesh and shader are both set.
    fn rebind(&mut self, gpu: &DeviceContext) {
        self.binding = None;
        if let (Some(mesh), Some(shader)) = (&self.mesh, &self.shader) {
            self.binding = RenderBinding::new(gpu, mesh, shader, &self.debug_name);
            if self.binding.is_none() {
                log::warn!(
                    "Node {:?} cannot be drawn with program `{}`.",
                    self.debug_name,
                    shader.name()
                );
            }
        }
    }

    /**
     * A childless copy with a fresh id that shares mesh and shader with `self`.
     *
     * The copy gets its own binding so both nodes can be drawn with different
     * uniforms in the same frame.
     */
    pub fn duplicate(&self, gpu: &DeviceContext) -> SceneNode {
        let mut node = SceneNode::new(self.debug_name.clone());
        node.transform = self.transform;
        node.color = self.color;
        node.mesh = self.mesh.clone();
        node.shader = self.shader.clone();
        node.rebind(gpu);
        node
    }

    pub fn add_child(&mut self, child: SceneNode) -> NodeId {
        let id = child.id;
        self.children.push(child);
        id
    }

    /// Detaches a direct child. Dropping the returned subtree releases its GPU resources.
    pub fn remove_child(&mut self, id: NodeId) -> Option<SceneNode> {
        let index = self.children.iter().position(|child| child.id == id)?;
        Some(self.children.remove(index))
    }

    /// Whether `id` is a direct child.
    pub fn has_child(&self, id: NodeId) -> bool {
        self.children.iter().any(|child| child.id == id)
    }

    pub fn child(&self, id: NodeId) -> Option<&SceneNode> {
        self.children.iter().find(|child| child.id == id)
    }

    pub fn child_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.children.iter_mut().find(|child| child.id == id)
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    /// Depth-first search of the subtree rooted at `self`.
    pub fn find(&self, id: NodeId) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    /// Orbits the node's position about the world origin, see [`Transform::rotate_around_origin`].
    pub fn rotate_around_origin(&mut self, degrees: f32, axis: Vector3<f32>) {
        self.transform.rotate_around_origin(degrees, axis);
    }

    fn visit<'a>(
        &'a self,
        parent: &Matrix4<f32>,
        order: DrawOrder,
        out: &mut Vec<Visit<'a>>,
    ) {
        let world = parent * self.transform.local_matrix();
        let visit = Visit {
            node: self,
            world,
            model: self.transform.model_matrix(world),
        };
        if order == DrawOrder::ParentFirst {
            out.push(visit);
        }
        for child in &self.children {
            child.visit(&world, order, out);
        }
        if order == DrawOrder::ChildrenFirst {
            out.push(visit);
        }
    }
}

/// When a node is drawn relative to its descendants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DrawOrder {
    /// Descendants are drawn before their ancestor.
    #[default]
    ChildrenFirst,
    ParentFirst,
}

/// Which space the light direction handed to shaders is fixed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightingSpace {
    /// A constant direction relative to the camera.
    #[default]
    View,
    /// [`SceneGraph::light_direction`], rotated into view space every frame.
    World,
}

/// Light direction used in [`LightingSpace::View`], pointing towards the light.
pub const VIEW_SPACE_LIGHT: Vector3<f32> = Vector3::new(0.3, 0.5, 1.0);

/// A node reached during traversal.
#[derive(Clone, Copy, Debug)]
pub struct Visit<'a> {
    pub node: &'a SceneNode,
    /// Accumulated `translate · rotate` of the node and all its ancestors.
    pub world: Matrix4<f32>,
    /// `world` with the node's own scale applied.
    pub model: Matrix4<f32>,
}

#[derive(Debug)]
pub struct SceneGraph {
    roots: Vec<SceneNode>,
    pub camera: Camera,
    /// Direction towards the light in world space.
    pub light_direction: Vector3<f32>,
    pub lighting: LightingSpace,
}

impl SceneGraph {
    pub fn new(camera: Camera) -> Self {
        Self {
            roots: Vec::new(),
            camera,
            light_direction: Vector3::new(1.0, 1.0, 1.0),
            lighting: LightingSpace::default(),
        }
    }

    pub fn add_root(&mut self, node: SceneNode) -> NodeId {
        let id = node.id;
        self.roots.push(node);
        id
    }

    pub fn remove_root(&mut self, id: NodeId) -> Option<SceneNode> {
        let index = self.roots.iter().position(|root| root.id == id)?;
        Some(self.roots.remove(index))
    }

    pub fn roots(&self) -> &[SceneNode] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.roots.iter().find_map(|root| root.find(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.roots.iter_mut().find_map(|root| root.find_mut(id))
    }

    /// Every node with its matrices, roots in insertion order, children in insertion order.
    pub fn traverse(&self, order: DrawOrder) -> Vec<Visit<'_>> {
        let identity = Matrix4::identity();
        let mut out = Vec::new();
        for root in &self.roots {
            root.visit(&identity, order, &mut out);
        }
        out
    }

    /// Pre-order list of every node's accumulated world transform.
    pub fn world_transforms(&self) -> Vec<(NodeId, Matrix4<f32>)> {
        self.traverse(DrawOrder::ParentFirst)
            .into_iter()
            .map(|visit| (visit.node.id, visit.world))
            .collect()
    }

    /// The nodes that produce a draw call this frame, in draw order.
    pub fn draw_list(&self, order: DrawOrder) -> Vec<Visit<'_>> {
        self.traverse(order)
            .into_iter()
            .filter(|visit| visit.node.binding.is_some())
            .collect()
    }

    /// Normalized direction towards the light in view space.
    pub fn light_direction_in_view(&self, view: &Matrix4<f32>) -> Vector3<f32> {
        let fixed = VIEW_SPACE_LIGHT.normalize();
        match self.lighting {
            LightingSpace::View => fixed,
            LightingSpace::World => {
                let dir = (view * Vector4::new(
                    self.light_direction.x,
                    self.light_direction.y,
                    self.light_direction.z,
                    0.0,
                ))
                .truncate();
                if dir.magnitude2() <= f32::EPSILON {
                    log::warn!("World light direction is zero, using the view-space default.");
                    fixed
                } else {
                    dir.normalize()
                }
            }
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new(Camera::default())
    }
}
