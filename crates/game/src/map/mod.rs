mod objects;
mod testing_ground;

pub use objects::MapObject;
pub use testing_ground::TestingGround;
