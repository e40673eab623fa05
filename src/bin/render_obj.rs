use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use trioctree_rs::{
    convert::{MeshTransform, ObjMesh},
    octree::{Octree, OctreeConfig, StorePaths, V3c},
    raytracing::{weave_surface, FrameStreamer, StreamConfig, Viewport},
};

/// Builds (or reopens) a triangle octree for every given OBJ file, and renders them into a PNG
#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input OBJ files, each one is placed into its own octree
    #[arg(required = true)]
    meshes: Vec<PathBuf>,

    /// Directory of the octree stores, one set of files for each mesh
    #[arg(long, default_value = "octree_store")]
    store: PathBuf,

    /// World space offset of each mesh as x,y,z; missing ones are placed at the origin
    #[arg(long, value_parser = parse_vector)]
    offset: Vec<V3c<f32>>,

    /// Uniform scale applied to every mesh
    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Camera position as x,y,z
    #[arg(long, value_parser = parse_vector, default_value = "0,0,5")]
    camera: V3c<f32>,

    /// The point the camera looks at as x,y,z
    #[arg(long, value_parser = parse_vector, default_value = "0,0,0")]
    target: V3c<f32>,

    /// Horizontal and vertical field of view in degrees
    #[arg(long, default_value = "60")]
    fov: f32,

    /// Image width in pixels
    #[arg(long, default_value = "256")]
    width: usize,

    /// Image height in pixels
    #[arg(long, default_value = "256")]
    height: usize,

    /// Number of worker threads
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Output PNG file path
    #[arg(short, long, default_value = "render.png")]
    output: PathBuf,
}

fn parse_vector(value: &str) -> Result<V3c<f32>, String> {
    let components = value
        .split(',')
        .map(|c| c.trim().parse::<f32>().map_err(|err| format!("{value}: {err}")))
        .collect::<Result<Vec<_>, _>>()?;
    match components[..] {
        [x, y, z] => Ok(V3c::new(x, y, z)),
        _ => Err(format!("{value}: expected 3 comma separated numbers")),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = RenderArgs::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    std::fs::create_dir_all(&args.store)?;
    let mut octrees = Vec::with_capacity(args.meshes.len());
    for (index, mesh_path) in args.meshes.iter().enumerate() {
        let stem = mesh_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("mesh_{index}"));
        let transform = MeshTransform::new(
            args.offset.get(index).copied().unwrap_or_default(),
            args.scale,
        );
        let octree = Octree::open_or_build(
            &StorePaths::in_directory(&args.store, &stem),
            &ObjMesh::new(mesh_path),
            &transform,
            OctreeConfig::default(),
        )?;
        tracing::info!("{}: {:?}", mesh_path.display(), octree);
        octrees.push(octree);
    }

    let viewport = Viewport {
        fov_horizontal: args.fov.to_radians(),
        fov_vertical: args.fov.to_radians(),
        ..Viewport::looking_at(args.camera, args.target)
    };
    let config = StreamConfig::default()
        .with_resolution(args.width, args.height)
        .with_threads(args.threads);
    let streamer = FrameStreamer::new(octrees, viewport, config);
    streamer.refresh();
    let frame = streamer
        .published()
        .take()
        .ok_or("the refreshed frame was not published")?;
    tracing::info!(
        "Surface of {} triangles in view",
        weave_surface(&frame).triangle_count()
    );

    let mut image = image::RgbImage::new(frame.width as u32, frame.height as u32);
    for (index, sample) in frame.samples.iter().enumerate() {
        let x = (index % frame.width) as u32;
        let y = (index / frame.width) as u32;
        let color = match sample.hit {
            Some(_) => {
                let shade = (40. + 215. * sample.light).clamp(0., 255.) as u8;
                image::Rgb([shade, shade, shade])
            }
            None => image::Rgb([20, 24, 40]),
        };
        image.put_pixel(x, y, color);
    }
    image.save(&args.output)?;
    tracing::info!("Saved {}", args.output.display());
    Ok(())
}
