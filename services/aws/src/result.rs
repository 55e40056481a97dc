// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::{
    ApiClient, Output, PaginatedInput, PaginatedOutput, RequestContext, Response, ResponseInfo,
    ResponseState,
};
use cirrus_core::{Error, Result};
use futures::Stream;
use log::{debug, warn};
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::time::Duration;

/// What is needed to request the page following a response.
pub(crate) struct PageSource<I> {
    client: ApiClient,
    input: I,
    context: RequestContext,
}

impl<I> PageSource<I> {
    pub(crate) fn new(client: ApiClient, input: I, context: RequestContext) -> Self {
        Self {
            client,
            input,
            context,
        }
    }
}

/// ApiResult is the typed, lazily populated result of a call.
///
/// The output is populated from the response the first time it is needed, and only once.
/// Results of listings (`I` being the originating input) can also walk the following pages,
/// see [`ApiResult::into_paginator`].
pub struct ApiResult<O, I = ()> {
    response: Response,
    output: Option<Result<O>>,
    source: Option<PageSource<I>>,
}

impl<O, I> Debug for ApiResult<O, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiResult")
            .field("response", &self.response)
            .field("populated", &self.output.is_some())
            .finish()
    }
}

impl<O: Output, I> ApiResult<O, I> {
    pub(crate) fn new(response: Response, source: Option<PageSource<I>>) -> Self {
        Self {
            response,
            output: None,
            source,
        }
    }

    /// Resolve the underlying response, see [`Response::resolve`].
    pub async fn resolve(&mut self, timeout: Option<Duration>) -> Result<ResponseState> {
        self.response.resolve(timeout).await
    }

    /// State of the underlying response. Never waits.
    pub fn info(&self) -> ResponseInfo {
        self.response.info()
    }

    /// Abort the underlying exchange if it is still in flight.
    pub fn cancel(&mut self) {
        self.response.cancel()
    }

    /// The underlying response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Typed output, populated on first access.
    ///
    /// A failed population is kept: later calls hand out the same error.
    pub async fn output(&mut self) -> Result<&O> {
        let output = match self.output.take() {
            Some(output) => output,
            None => populate(&mut self.response).await,
        };
        match self.output.insert(output) {
            Ok(output) => Ok(&*output),
            Err(err) => Err(err.clone()),
        }
    }

    /// Consume the result into its typed output.
    pub async fn into_output(mut self) -> Result<O> {
        match self.output.take() {
            Some(output) => output,
            None => populate(&mut self.response).await,
        }
    }
}

async fn populate<O: Output>(response: &mut Response) -> Result<O> {
    match response.resolve(None).await? {
        ResponseState::Cancelled => Err(Error::logic("response has been cancelled")),
        _ => O::populate(response),
    }
}

impl<O, I> ApiResult<O, I>
where
    O: PaginatedOutput,
    I: PaginatedInput,
{
    /// Walk the items of this page and of every following page.
    pub fn into_paginator(self) -> Paginator<O, I> {
        let ApiResult {
            response,
            output,
            source,
        } = self;

        let current = match output {
            Some(Ok(output)) => Page::Ready(output),
            Some(Err(err)) => Page::Failed(err),
            None => Page::Dispatched(response),
        };
        Paginator {
            source,
            current: Some(current),
            items: VecDeque::new(),
        }
    }

    /// Stream of the items of every page.
    pub fn into_stream(self) -> impl Stream<Item = Result<O::Item>> + Send {
        futures::stream::unfold(Some(self.into_paginator()), |paginator| async move {
            let mut paginator = paginator?;
            match paginator.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(paginator))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Stream of the pages themselves.
    pub fn pages(self) -> impl Stream<Item = Result<O>> + Send {
        futures::stream::unfold(Some(self.into_paginator()), |paginator| async move {
            let mut paginator = paginator?;
            match paginator.next_page().await {
                Ok(Some(page)) => Some((Ok(page), Some(paginator))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

enum Page<O> {
    Ready(O),
    Dispatched(Response),
    Failed(Error),
}

/// Paginator walks a listing page after page.
///
/// When a page is loaded, the request for the next one is sent right away so that it is in
/// flight while the caller consumes the current items. A page is never requested twice, and
/// a page further than the prefetched one is only requested once the caller reaches it.
///
/// A page that failed, to load or to be requested, stays in place: every later call hands
/// out its error again instead of ending the listing.
///
/// Dropping the paginator cancels the prefetched page.
pub struct Paginator<O: PaginatedOutput, I> {
    source: Option<PageSource<I>>,
    current: Option<Page<O>>,
    items: VecDeque<O::Item>,
}

impl<O, I> Paginator<O, I>
where
    O: PaginatedOutput,
    I: PaginatedInput,
{
    /// Next item of the listing, `None` once every page is consumed.
    pub async fn next(&mut self) -> Result<Option<O::Item>> {
        loop {
            if let Some(item) = self.items.pop_front() {
                return Ok(Some(item));
            }

            match self.next_page().await? {
                Some(mut page) => self.items.extend(page.take_items()),
                None => return Ok(None),
            }
        }
    }

    /// Next page of the listing, `None` after the last one.
    ///
    /// Items of a page returned here are not handed out by [`Paginator::next`].
    pub async fn next_page(&mut self) -> Result<Option<O>> {
        let output = match self.current.take() {
            None => return Ok(None),
            Some(Page::Ready(output)) => output,
            Some(Page::Failed(err)) => {
                self.current = Some(Page::Failed(err.clone()));
                return Err(err);
            }
            Some(Page::Dispatched(mut response)) => match populate(&mut response).await {
                Ok(output) => output,
                Err(err) => {
                    self.current = Some(Page::Failed(err.clone()));
                    return Err(err);
                }
            },
        };

        if let (Some(token), Some(source)) = (output.next_token(), self.source.as_mut()) {
            if !token.is_empty() {
                debug!("prefetching next page with token {token}");
                let input = source.input.with_next_token(token);
                let page = match source.client.response(&input, &source.context).await {
                    Ok(response) => Page::Dispatched(response),
                    Err(err) => {
                        warn!("failed to request next page: {err}");
                        Page::Failed(err)
                    }
                };
                source.input = input;
                self.current = Some(page);
            }
        }

        Ok(Some(output))
    }
}

impl<O: PaginatedOutput, I> Drop for Paginator<O, I> {
    fn drop(&mut self) {
        if let Some(Page::Dispatched(response)) = &mut self.current {
            response.cancel();
        }
    }
}
