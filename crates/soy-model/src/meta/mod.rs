mod key;
pub use key::{ObjectKey, ObjectRef};

mod object;
pub use object::ObjectMeta;

mod owner;
pub use owner::OwnerReference;

mod resource;
pub use resource::Resource;
