use anyhow::{anyhow, bail, Result};

/// Which of the demo programs is running. Each one differs only in how many
/// uniform blocks it spreads the model matrices across and how it places them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// One block holding every matrix, re-uploaded each frame, objects on a ring.
    UniformArray,
    /// Two blocks: a square-ish grid plus a half-cell offset layer.
    Grid2d,
    /// Four blocks: four cube lattices seen through an orbiting camera.
    Cube3d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Orthographic,
    Perspective,
}

impl Variant {
    pub fn clusters(&self) -> u32 {
        match self {
            Self::UniformArray => 1,
            Self::Grid2d => 2,
            Self::Cube3d => 4,
        }
    }

    /// Half-size of the generated triangle before the model matrix is applied.
    pub fn triangle_scale(&self) -> f32 {
        match self {
            Self::UniformArray => 0.1,
            Self::Grid2d => 0.02,
            Self::Cube3d => 0.2,
        }
    }

    pub fn projection(&self) -> Projection {
        match self {
            Self::UniformArray | Self::Grid2d => Projection::Orthographic,
            Self::Cube3d => Projection::Perspective,
        }
    }

    pub fn orbits(&self) -> bool {
        matches!(self, Self::Cube3d)
    }

    /// The single-block program writes its matrices every frame instead of once.
    pub fn uploads_every_frame(&self) -> bool {
        matches!(self, Self::UniformArray)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::UniformArray => "transform as uniform variable",
            Self::Grid2d => "transforms in uniform buffer",
            Self::Cube3d => "transforms in uniform buffers (3d)",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub variant: Variant,
    pub num_objects: u32,
    pub window_size: (u32, u32),
    pub clear_color: wgpu::Color,
}

impl RunConfig {
    pub fn new(variant: Variant, num_objects: u32) -> Self {
        Self {
            variant,
            num_objects,
            window_size: (800, 600),
            clear_color: wgpu::Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
        }
    }

    /// Parses `<program> <num_objects>`. Anything other than exactly one
    /// positive integer argument is a usage error.
    pub fn from_args<I>(variant: Variant, args: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut args = args.into_iter();
        let program = args
            .next()
            .map(|p| p.as_ref().to_owned())
            .unwrap_or_else(|| "trigrid".to_owned());
        let usage = || anyhow!("Usage: {program} <num_objects>");

        let raw = args.next().ok_or_else(usage)?;
        if args.next().is_some() {
            return Err(usage());
        }
        let num_objects = parse_num_objects(raw.as_ref())?;
        Ok(Self::new(variant, num_objects))
    }
}

fn parse_num_objects(raw: &str) -> Result<u32> {
    let value: i64 = match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => bail!("Error: num_objects must be a positive integer, got {raw:?}."),
    };
    if value <= 0 {
        bail!("Error: num_objects must be a positive integer, got {value}.");
    }
    u32::try_from(value).map_err(|_| anyhow!("Error: num_objects {value} is too large."))
}
