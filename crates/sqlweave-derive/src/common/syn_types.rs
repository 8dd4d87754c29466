//! Type helper utilities for syn type analysis.

/// The single generic argument of a path type whose last segment is `name`.
fn generic_inner<'a>(ty: &'a syn::Type, name: &str) -> Option<&'a syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let seg = type_path.path.segments.last()?;
    if seg.ident != name {
        return None;
    }
    let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
        return None;
    };
    if args.args.len() != 1 {
        return None;
    }
    let syn::GenericArgument::Type(inner) = args.args.first()? else {
        return None;
    };
    Some(inner)
}

/// Extract the inner type T from Option<T>, or return None if not an Option type.
pub fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    generic_inner(ty, "Option")
}

/// Extract the inner type T from Vec<T>, or return None if not a Vec type.
pub fn vec_inner(ty: &syn::Type) -> Option<&syn::Type> {
    generic_inner(ty, "Vec")
}

/// Extract the inner type T from Box<T>.
pub fn box_inner(ty: &syn::Type) -> Option<&syn::Type> {
    generic_inner(ty, "Box")
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_option_inner() {
        let ty: syn::Type = parse_quote!(Option<String>);
        assert!(option_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(std::option::Option<i32>);
        assert!(option_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(String);
        assert!(option_inner(&ty).is_none());
    }

    #[test]
    fn test_vec_and_box_inner() {
        let ty: syn::Type = parse_quote!(Vec<Post>);
        assert!(vec_inner(&ty).is_some());

        let ty: syn::Type = parse_quote!(Option<Box<Profile>>);
        let inner = option_inner(&ty).and_then(box_inner);
        assert!(inner.is_some());

        let ty: syn::Type = parse_quote!(Vec<u8, A>);
        assert!(vec_inner(&ty).is_none());
    }
}
