pub mod depth_vert {
    vulkano_shaders::shader! {
        ty: "vertex",
        path: "src/shaders/depth.vert"
    }
}

pub mod depth_frag {
    vulkano_shaders::shader! {
        ty: "fragment",
        path: "src/shaders/depth.frag"
    }
}

pub mod lit_vert {
    vulkano_shaders::shader! {
        ty: "vertex",
        path: "src/shaders/lit.vert"
    }
}

pub mod lit_frag {
    vulkano_shaders::shader! {
        ty: "fragment",
        path: "src/shaders/lit.frag"
    }
}

pub mod emissive_frag {
    vulkano_shaders::shader! {
        ty: "fragment",
        path: "src/shaders/emissive.frag"
    }
}
