//! # Scene
//!
//! Actors (mapper + property + transform), a camera and a renderer that turns them
//! into display-space primitives for a [`DisplaySurface`], plus a ray-casting
//! [`CellPicker`].
//!
//! ```
//! use vtk_pipeline::filters::PlaneSource;
//! use vtk_pipeline::scene::{Actor, CellPicker, Mapper, Renderer};
//!
//! let plane = PlaneSource::new().generate().unwrap();
//! let mut renderer = Renderer::new();
//! renderer.add_actor(Actor::with_mapper(Mapper::with_input(plane)));
//! renderer.reset_camera();
//! renderer.render();
//!
//! let hit = CellPicker::new().pick(150.0, 150.0, &renderer).unwrap();
//! assert_eq!(hit.cell_id, 0);
//! ```

mod actor;
mod camera;
mod lookup_table;
mod mapper;
mod picker;
mod property;
mod renderer;

pub use actor::Actor;
pub use camera::Camera;
pub use lookup_table::{LookupTable, VectorMode};
pub use mapper::{BlockAttributes, ColorMode, MappedColors, Mapper, ScalarMode};
pub use picker::{CellPicker, PickResult};
pub use property::{Property, Representation};
pub use renderer::{DisplaySurface, Frame, Primitive, PrimitiveKind, RecordingSurface, Renderer};
