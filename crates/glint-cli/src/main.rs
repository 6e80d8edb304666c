//! Demo driver: builds the full two-level pipeline over a procedural scene
//! and reports what came out. Useful for eyeballing build stats while tuning
//! constants, and as a smoke test of the whole crate stack.

use anyhow::Result;
use clap::Parser;
use glint_accel::{layout, AccelStore, BuildConfig, BuildStats, WideBvh};
use glint_math::{Point2, Point3, Transform, Vec3};
use glint_scene::Scene;

#[derive(Parser)]
#[command(name = "glint", about = "Build BVH/TLAS acceleration structures over a demo scene")]
struct Args {
    /// SAH bins per axis.
    #[arg(long, default_value_t = 8)]
    bins: usize,

    /// Leaf threshold in primitives.
    #[arg(long, default_value_t = 2)]
    min_leaf: usize,

    /// Spatial-split overlap threshold in (0, 1]; 1 disables spatial splits.
    #[arg(long, default_value_t = 1e-5)]
    alpha: f32,

    /// Triangle grid resolution per side of the demo patch.
    #[arg(long, default_value_t = 24)]
    grid: usize,

    /// Number of instances to place in a ring.
    #[arg(long, default_value_t = 6)]
    instances: usize,

    /// Also collapse each shape tree into a 4-ary wide tree.
    #[arg(long)]
    wide: bool,
}

/// A bumpy triangulated patch plus a few spheres and a ground plane.
fn demo_scene(grid: usize) -> Scene {
    let mut scene = Scene::new();
    scene.add_material("patch", [0.8, 0.8, 0.8]);
    scene.add_material("ball", [0.9, 0.3, 0.2]);
    scene.add_material("ground", [0.2, 0.25, 0.3]);

    let uv = Point2::new(0.0, 0.0);
    let height = |x: f32, z: f32| (x * 0.7).sin() * (z * 0.5).cos();
    for i in 0..grid {
        for j in 0..grid {
            let (x0, z0) = (i as f32, j as f32);
            let (x1, z1) = (x0 + 1.0, z0 + 1.0);
            let p00 = Point3::new(x0, height(x0, z0), z0);
            let p10 = Point3::new(x1, height(x1, z0), z0);
            let p01 = Point3::new(x0, height(x0, z1), z1);
            let p11 = Point3::new(x1, height(x1, z1), z1);
            scene.add_triangle(p00, p10, p11, uv, uv, uv, "patch");
            scene.add_triangle(p00, p11, p01, uv, uv, uv, "patch");
        }
    }
    for i in 0..8 {
        let a = i as f32 * std::f32::consts::TAU / 8.0;
        scene.add_sphere(
            Point3::new(
                grid as f32 * 0.5 + a.cos() * grid as f32 * 0.3,
                2.0,
                grid as f32 * 0.5 + a.sin() * grid as f32 * 0.3,
            ),
            0.75,
            "ball",
        );
    }
    scene.add_plane(Vec3::new(0.0, 1.0, 0.0), 1.5, "ground");
    scene
}

fn print_stats(label: &str, stats: &BuildStats) {
    println!(
        "  {label}: {} object splits, {} spatial splits, {} duplicated refs, {} leaves",
        stats.object_splits, stats.spatial_splits, stats.duplicated_refs, stats.leaf_count
    );
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = BuildConfig {
        bins: args.bins,
        min_leaf_prims: args.min_leaf,
        spatial_alpha: args.alpha,
    };

    let scene = demo_scene(args.grid);
    println!(
        "scene: {} primitives, {} materials",
        scene.primitives().len(),
        scene.materials().len()
    );

    let mut store = AccelStore::new();
    let (shape, stats) = store.add_shape(scene.primitives(), &config);
    println!(
        "shape tree: {} nodes over {} prim-index slots ({} unbounded primitives set aside)",
        store.shapes()[shape.0 as usize].node_count,
        store.shapes()[shape.0 as usize].prim_count,
        store.shapes()[shape.0 as usize].unbounded.len()
    );
    print_stats("build", &stats);

    for i in 0..args.instances {
        let a = i as f32 * std::f32::consts::TAU / args.instances.max(1) as f32;
        let t = Transform::translation(a.cos() * 80.0, 0.0, a.sin() * 80.0)
            .then(&Transform::rotation_y(a));
        store.add_instance(shape, t)?;
    }
    let instance_count = store.instances().len();
    let tlas = store.tlas();
    println!(
        "tlas: {} nodes over {} instances (root {})",
        tlas.nodes.len(),
        instance_count,
        tlas.root
    );

    let gpu_tlas = layout::flatten_tlas(store.tlas());
    let gpu_instances = layout::flatten_instances(store.instances());
    println!(
        "upload: {} instance records, {} tlas records",
        gpu_instances.len(),
        gpu_tlas.len()
    );

    if args.wide {
        let (bvh, _) = glint_accel::BinaryBvh::build(scene.primitives(), &config);
        let wide = WideBvh::from_binary(&bvh);
        let flat = layout::flatten_wide(&wide);
        println!(
            "wide tree: {} nodes ({} binary), {} bytes serialized",
            wide.nodes.len(),
            bvh.nodes.len(),
            flat.len() * std::mem::size_of::<layout::GpuWideNode>()
        );
    }

    Ok(())
}
