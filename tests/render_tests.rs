use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use zenith_ssr::template::{ComponentRegistry, JsonTemplateCompiler};
use zenith_ssr::{
    ChannelSink, ComponentInstance, ComponentNode, ComponentOptions, DefaultInstanceFactory,
    DirectiveBinding, ElementNode, InstanceFactory, InstanceRef, RenderError, Renderer,
    RendererOptions, VNode, WriterSink,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn root_with<F>(render: F) -> InstanceRef
where
    F: Fn(&InstanceRef) -> VNode + Send + Sync + 'static,
{
    ComponentInstance::root(Arc::new(ComponentOptions::new().render(render)), Value::Null)
}

async fn render(renderer: &Renderer, root: &InstanceRef) -> String {
    renderer.render_to_string(root).await.unwrap()
}

/// Keeps every instance it creates.
#[derive(Default)]
struct RecordingFactory {
    created: Mutex<Vec<InstanceRef>>,
}

impl InstanceFactory for RecordingFactory {
    fn create(&self, node: &ComponentNode, parent: Option<&InstanceRef>) -> InstanceRef {
        let instance = DefaultInstanceFactory.create(node, parent);
        self.created.lock().unwrap().push(Arc::clone(&instance));
        instance
    }
}

// ===========================================================================
// Static trees
// ===========================================================================

#[tokio::test]
async fn mixed_children_render_in_order() {
    let renderer = Renderer::new(RendererOptions::default().with_unary_tag(|_| false));
    let root = root_with(|_| {
        ElementNode::new("div")
            .child(VNode::text("Hi"))
            .child(VNode::comment("c"))
            .child(ElementNode::new("span").child(VNode::text("<b>")))
            .into()
    });

    assert_eq!(
        render(&renderer, &root).await,
        r#"<div server-rendered="true">Hi<!--c--><span>&lt;b&gt;</span></div>"#
    );
}

#[tokio::test]
async fn raw_text_is_not_escaped() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(|_| {
        ElementNode::new("p")
            .child(VNode::raw("<em>ok</em>"))
            .child(VNode::text("a & b"))
            .into()
    });
    assert_eq!(
        render(&renderer, &root).await,
        r#"<p server-rendered="true"><em>ok</em>a &amp; b</p>"#
    );
}

#[tokio::test]
async fn unary_and_empty_elements() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(|_| {
        ElementNode::new("div")
            .child(ElementNode::new("img").attr("src", "a.png"))
            .child(ElementNode::new("br"))
            .child(ElementNode::new("span"))
            .into()
    });
    assert_eq!(
        render(&renderer, &root).await,
        r#"<div server-rendered="true"><img src="a.png"><br><span></span></div>"#
    );
}

#[tokio::test]
async fn attributes_keep_declaration_order() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(|_| {
        ElementNode::new("div")
            .attr("title", "t")
            .attr("alpha", "a")
            .style("z-index", "1")
            .style("color", "red")
            .into()
    });
    assert_eq!(
        render(&renderer, &root).await,
        r#"<div title="t" alpha="a" server-rendered="true" style="z-index:1;color:red;"></div>"#
    );
}

#[tokio::test]
async fn root_text_node_has_no_marker() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(|_| VNode::text("plain"));
    assert_eq!(render(&renderer, &root).await, "plain");
}

#[tokio::test]
async fn bare_options_skip_attribute_serialization() {
    let renderer = Renderer::new(RendererOptions::bare());
    let root = root_with(|_| ElementNode::new("div").attr("id", "x").into());
    assert_eq!(render(&renderer, &root).await, "<div></div>");
}

#[tokio::test]
async fn directives_feed_modules() {
    let renderer = Renderer::new(RendererOptions::default().with_directive(
        "upper",
        |el: &mut ElementNode, binding: &DirectiveBinding| {
            el.data
                .attrs
                .insert("data-upper".into(), binding.value.clone());
        },
    ));
    let root = root_with(|_| {
        ElementNode::new("div")
            .child(
                ElementNode::new("p")
                    .directive(DirectiveBinding::new("show", json!(false)))
                    .directive(DirectiveBinding::new("upper", json!("yes"))),
            )
            .into()
    });
    assert_eq!(
        render(&renderer, &root).await,
        r#"<div server-rendered="true"><p data-upper="yes" style="display:none;"></p></div>"#
    );
}

// ===========================================================================
// Components
// ===========================================================================

#[tokio::test]
async fn nested_component_renders_inline() {
    let child = Arc::new(ComponentOptions::new().render(|vm| {
        ElementNode::new("span")
            .owned_by(vm)
            .child(VNode::text(vm.prop("msg").and_then(Value::as_str).unwrap_or("")))
            .into()
    }));
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(move |vm| {
        ElementNode::new("div")
            .owned_by(vm)
            .child(ComponentNode::new(Arc::clone(&child), json!({ "msg": "a" })).owned_by(vm))
            .child(ComponentNode::new(Arc::clone(&child), json!({ "msg": "b" })).owned_by(vm))
            .into()
    });
    assert_eq!(
        render(&renderer, &root).await,
        r#"<div server-rendered="true"><span>a</span><span>b</span></div>"#
    );
}

#[tokio::test]
async fn root_marker_reaches_through_component_root() {
    let inner = Arc::new(
        ComponentOptions::new().render(|vm| ElementNode::new("main").owned_by(vm).into()),
    );
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(move |vm| {
        ComponentNode::new(Arc::clone(&inner), Value::Null)
            .owned_by(vm)
            .into()
    });
    assert_eq!(
        render(&renderer, &root).await,
        r#"<main server-rendered="true"></main>"#
    );
}

#[tokio::test]
async fn scope_ids_follow_owner_and_parent_chain() {
    let child = Arc::new(ComponentOptions::new().scope_id("data-v-c").render(|vm| {
        let parent = vm.parent().expect("child has a parent instance");
        ElementNode::new("p")
            .owned_by(vm)
            .child(ElementNode::new("i").owned_by(vm).child(VNode::text("x")))
            // slot content belongs to the parent
            .child(ElementNode::new("b").owned_by(parent).child(VNode::text("slot")))
            .into()
    }));
    let parent = ComponentInstance::root(
        Arc::new(ComponentOptions::new().scope_id("data-v-p").render(move |vm| {
            ElementNode::new("div")
                .owned_by(vm)
                .child(ComponentNode::new(Arc::clone(&child), Value::Null).owned_by(vm))
                .into()
        })),
        Value::Null,
    );

    let renderer = Renderer::new(RendererOptions::default());
    assert_eq!(
        render(&renderer, &parent).await,
        concat!(
            r#"<div server-rendered="true" data-v-p>"#,
            r#"<p data-v-c data-v-p><i data-v-c>x</i><b data-v-c data-v-p>slot</b></p>"#,
            "</div>"
        )
    );
}

#[tokio::test]
async fn scope_id_on_component_rooted_component() {
    // outer renders <middle/> as its root; middle renders <inner/> as its root
    let inner = Arc::new(
        ComponentOptions::new()
            .scope_id("data-v-inner")
            .render(|vm| ElementNode::new("em").owned_by(vm).into()),
    );
    let middle = Arc::new(ComponentOptions::new().scope_id("data-v-middle").render(
        move |vm| {
            ComponentNode::new(Arc::clone(&inner), Value::Null)
                .owned_by(vm)
                .into()
        },
    ));
    let outer = ComponentInstance::root(
        Arc::new(ComponentOptions::new().scope_id("data-v-outer").render(move |vm| {
            ElementNode::new("div")
                .owned_by(vm)
                .child(ComponentNode::new(Arc::clone(&middle), Value::Null).owned_by(vm))
                .into()
        })),
        Value::Null,
    );

    let renderer = Renderer::new(RendererOptions::bare());
    assert_eq!(
        render(&renderer, &outer).await,
        "<div data-v-outer><em data-v-inner data-v-middle data-v-outer></em></div>"
    );
}

// ===========================================================================
// Templates
// ===========================================================================

#[tokio::test]
async fn templates_compile_once_per_text() {
    let registry = Arc::new(ComponentRegistry::new());
    registry.register(
        "badge",
        ComponentOptions::new().name("badge").template(
            r#"{ "type": "element", "tag": "span", "static_class": "badge",
                 "children": [{ "type": "prop", "name": "label" }] }"#,
        ),
    );
    let options = RendererOptions::default()
        .with_compiler(Arc::new(JsonTemplateCompiler::new(Arc::clone(&registry))));
    let renderer = Renderer::new(options);

    let root = ComponentInstance::root(
        Arc::new(ComponentOptions::new().template(
            r#"{ "type": "element", "tag": "div", "children": [
                { "type": "component", "name": "badge", "props": { "label": "one" } },
                { "type": "component", "name": "badge", "bind": { "label": "who" } }
            ] }"#,
        )),
        json!({ "who": "two" }),
    );

    assert_eq!(
        render(&renderer, &root).await,
        r#"<div server-rendered="true"><span class="badge">one</span><span class="badge">two</span></div>"#
    );
    // root template + badge template
    assert_eq!(renderer.compilation().len(), 2);
}

#[tokio::test]
async fn compiled_step_is_installed_on_each_instance() {
    let registry = Arc::new(ComponentRegistry::new());
    let badge = registry.register(
        "badge",
        ComponentOptions::new().name("badge").template(
            r#"{ "type": "element", "tag": "b", "children": [{ "type": "prop", "name": "n" }] }"#,
        ),
    );
    let factory = Arc::new(RecordingFactory::default());
    let renderer = Renderer::new(
        RendererOptions::default()
            .with_compiler(Arc::new(JsonTemplateCompiler::new(registry)))
            .with_instance_factory(Arc::clone(&factory) as Arc<dyn InstanceFactory>),
    );
    let root = root_with(move |vm| {
        ElementNode::new("p")
            .owned_by(vm)
            .child(ComponentNode::new(Arc::clone(&badge), json!({ "n": 1 })).owned_by(vm))
            .child(ComponentNode::new(Arc::clone(&badge), json!({ "n": 2 })).owned_by(vm))
            .into()
    });

    assert_eq!(
        render(&renderer, &root).await,
        r#"<p server-rendered="true"><b>1</b><b>2</b></p>"#
    );
    let created = factory.created.lock().unwrap();
    assert_eq!(created.len(), 2);
    for instance in created.iter() {
        assert!(instance.render_fn().is_some());
        assert!(Arc::ptr_eq(instance.parent().unwrap(), &root));
        assert!(matches!(instance.render(), Ok(VNode::Element(ref el)) if el.tag == "b"));
    }
}

// ===========================================================================
// Errors
// ===========================================================================

#[tokio::test]
async fn missing_render_aborts() {
    let broken = Arc::new(ComponentOptions::new().name("broken"));
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(move |vm| {
        ElementNode::new("div")
            .child(VNode::text("before"))
            .child(ComponentNode::new(Arc::clone(&broken), Value::Null).owned_by(vm))
            .into()
    });

    let err = renderer.render_to_string(&root).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "render function or template not defined in component: broken"
    );
}

#[tokio::test]
async fn missing_render_names_tag_when_anonymous() {
    let anon = Arc::new(ComponentOptions::new());
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(move |_| {
        ComponentNode::new(Arc::clone(&anon), Value::Null)
            .tag("my-widget")
            .into()
    });
    match renderer.render_to_string(&root).await {
        Err(RenderError::MissingRender { component }) => assert_eq!(component, "my-widget"),
        other => panic!("expected MissingRender, got {:?}", other),
    }
}

#[tokio::test]
async fn template_without_compiler_fails() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = ComponentInstance::root(
        Arc::new(ComponentOptions::new().template("<div></div>")),
        Value::Null,
    );
    let err = renderer.render_to_string(&root).await.unwrap_err();
    assert!(matches!(err, RenderError::Compile { .. }));
}

#[tokio::test]
async fn sink_failure_propagates() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(|_| ElementNode::new("div").child(VNode::text("x")).into());
    let (mut sink, rx) = ChannelSink::channel(1);
    drop(rx);
    let err = renderer.render(&root, &mut sink).await.unwrap_err();
    assert!(matches!(err, RenderError::Sink(_)));
}

// ===========================================================================
// Streaming
// ===========================================================================

#[tokio::test]
async fn stream_matches_string_render() {
    let renderer = Arc::new(Renderer::new(RendererOptions::default()));
    let make_root = || {
        root_with(|_| {
            let items = (0..20)
                .map(|i| VNode::from(ElementNode::new("li").child(VNode::text(i.to_string()))));
            ElementNode::new("ul").children(items).into()
        })
    };

    let expected = renderer.render_to_string(&make_root()).await.unwrap();

    let mut rx = renderer.render_to_stream(make_root(), 2);
    let mut chunks = Vec::new();
    while let Some(chunk) = rx.recv().await {
        chunks.push(chunk.unwrap());
    }
    assert!(chunks.len() > 1);
    assert_eq!(chunks.concat(), expected);
}

#[tokio::test]
async fn writer_sink_receives_whole_document() {
    let renderer = Renderer::new(RendererOptions::default());
    let root = root_with(|_| ElementNode::new("div").child(VNode::text("a < b")).into());
    let mut sink = WriterSink::new(Vec::new());
    renderer.render(&root, &mut sink).await.unwrap();
    assert_eq!(
        String::from_utf8(sink.into_inner()).unwrap(),
        r#"<div server-rendered="true">a &lt; b</div>"#
    );
}

#[tokio::test]
async fn stream_reports_errors_last() {
    let renderer = Arc::new(Renderer::new(RendererOptions::default()));
    let broken = Arc::new(ComponentOptions::new());
    let root = root_with(move |vm| {
        ElementNode::new("div")
            .child(ComponentNode::new(Arc::clone(&broken), Value::Null).owned_by(vm))
            .into()
    });

    let mut rx = renderer.render_to_stream(root, 8);
    let mut items = Vec::new();
    while let Some(item) = rx.recv().await {
        items.push(item);
    }
    assert!(matches!(items.first(), Some(Ok(chunk)) if chunk.starts_with("<div")));
    assert!(matches!(items.last(), Some(Err(RenderError::MissingRender { .. }))));
}
