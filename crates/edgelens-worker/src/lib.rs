//! Cloudflare Worker for edgelens
//!
//! Fronts the origin: sanitizes the request, forwards it with trust headers, and
//! streams HTML responses through the article rewriter. All policy lives in
//! edgelens-core; this file only maps it onto the Workers runtime.

use edgelens_core::{
    ArticleRewriter, Config, DebugLog, EdgeError, HeaderStore, OriginRequest, Route, finalize,
    is_html, preflight, route, stamp,
};
use futures_util::stream::{self, Stream, StreamExt};
use worker::*;

/// `HeaderStore` over the runtime's header object
struct WorkerHeaders<'a>(&'a mut Headers);

impl HeaderStore for WorkerHeaders<'_> {
    type Error = Error;

    fn get(&self, name: &str) -> Result<Option<String>> {
        self.0.get(name)
    }

    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.0.set(name, value)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        self.0.delete(name)
    }
}

fn read_config(env: &Env) -> Config {
    Config::from_lookup(|key| {
        env.var(key)
            .map(|v| v.to_string())
            .or_else(|_| env.secret(key).map(|s| s.to_string()))
            .ok()
    })
}

fn rewrite_error(e: EdgeError) -> Error {
    Error::RustError(e.to_string())
}

/// Plain-text response produced by the worker itself
fn local_response(status: u16, body: &str) -> Result<Response> {
    let mut resp = Response::ok(body)?.with_status(status);
    stamp(&mut WorkerHeaders(resp.headers_mut()))?;
    Ok(resp)
}

fn answer_locally(route: &Route) -> Result<Response> {
    match route {
        Route::Preflight => {
            let mut resp = Response::empty()?.with_status(204);
            preflight(&mut WorkerHeaders(resp.headers_mut()))?;
            Ok(resp)
        }
        _ => {
            let (status, body) = route
                .local_response()
                .unwrap_or((500, "Internal Server Error".to_string()));
            let mut resp = local_response(status, &body)?;
            if let Route::StripPort { location } = route {
                resp.headers_mut().set("location", location)?;
            }
            Ok(resp)
        }
    }
}

/// Forward `input` through the rewriter chunk by chunk, flushing the tail at the end
fn rewrite_stream(
    input: ByteStream,
    rewriter: ArticleRewriter,
) -> impl Stream<Item = Result<Vec<u8>>> {
    stream::unfold(Some((input, rewriter)), |state| async move {
        let (mut input, mut rewriter) = state?;
        match input.next().await {
            Some(Ok(chunk)) => match rewriter.write(&chunk) {
                Ok(out) => Some((Ok(out), Some((input, rewriter)))),
                Err(e) => Some((Err(rewrite_error(e)), None)),
            },
            Some(Err(e)) => Some((Err(e), None)),
            None => Some((rewriter.end().map(|(tail, _)| tail).map_err(rewrite_error), None)),
        }
    })
}

async fn proxy(
    mut req: Request,
    url: Url,
    config: &Config,
    debug: DebugLog,
) -> Result<Response> {
    let inbound_host = req.headers().get("host")?;
    let origin_request = match OriginRequest::build(&url, inbound_host.as_deref(), config) {
        Ok(request) => request,
        Err(e) => {
            debug.log(format_args!("[Worker] {e}"));
            return local_response(e.status(), &e.to_string());
        }
    };
    debug.log(format_args!(
        "{} {:?} -> {}",
        url.path(),
        origin_request.class,
        origin_request.url
    ));

    let headers = req.headers().clone();
    for (name, value) in &origin_request.headers {
        headers.set(name, value)?;
    }

    let method = req.method();
    let body = match method {
        Method::Get | Method::Head => None,
        _ => Some(req.bytes().await?.into()),
    };

    let mut init = RequestInit::new();
    init.with_method(method)
        .with_headers(headers)
        .with_body(body)
        .with_redirect(RequestRedirect::Manual)
        // HTML is not cached by default; the rewritten pages must be
        .with_cf_properties(CfProperties {
            cache_everything: Some(true),
            ..CfProperties::default()
        });

    let upstream_req = Request::new_with_init(origin_request.url.as_str(), &init)?;
    let mut upstream = Fetch::Request(upstream_req).send().await?;
    let status = upstream.status_code();
    debug.log(format_args!("[Worker] origin responded {status}"));

    // fetched headers are immutable; work on a copy
    let mut headers = upstream.headers().clone();
    let rewrite = is_html(headers.get("content-type")?.as_deref());

    let resp = match upstream.stream() {
        Ok(body) if rewrite => {
            headers.delete("content-length")?;
            // publisher name: the host the client asked for, not the origin
            let hostname = url.host_str().unwrap_or_default();
            let rewriter = ArticleRewriter::new(hostname, debug);
            Response::from_stream(rewrite_stream(body, rewriter))?
        }
        Ok(body) => Response::from_stream(body)?,
        Err(_) => Response::empty()?,
    };

    finalize(
        status,
        &origin_request.saved_search,
        &mut WorkerHeaders(&mut headers),
    )?;
    Ok(resp.with_status(status).with_headers(headers))
}

#[event(start)]
fn start() {
    console_error_panic_hook::set_once();
    // records only ever come from DebugLog
    let _ = console_log::init_with_level(log::Level::Debug);
}

#[event(fetch)]
async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    let url = req.url()?;
    let config = read_config(&env);
    let debug = DebugLog::new(config.debug);
    debug.log(format_args!("[Worker] {} {}", req.method(), url.path()));

    let route = route(req.method().as_ref(), &url);
    debug.log(format_args!("route: {:?}", route));

    match route {
        Route::Proxy => proxy(req, url, &config, debug).await,
        _ => answer_locally(&route),
    }
}
