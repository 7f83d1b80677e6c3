//! Error.prototype and the native error type prototypes

use crate::context::VmContext;
use crate::object::ErrorKind;
use crate::value::Value;

/// Initialize Error.prototype and all error type prototypes
pub fn init_error_prototypes(ctx: &mut VmContext) {
    for kind in [ErrorKind::Error, ErrorKind::TypeError, ErrorKind::RangeError] {
        let proto = ctx.intrinsics().error_prototype_for(kind);
        ctx.define_property(proto, "name", Value::string(kind.name()));
        ctx.define_property(proto, "message", Value::string(""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_inherited() {
        let mut ctx = VmContext::new();
        let err = ctx.create_error(ErrorKind::TypeError, "bad");
        assert_eq!(ctx.get(&err, "name").unwrap(), Value::string("TypeError"));
        assert_eq!(ctx.get(&err, "message").unwrap(), Value::string("bad"));
    }
}
