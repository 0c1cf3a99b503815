use alloc::boxed::Box;

/// A request handler that is called by the registry machinery with the requesting scope.
pub(crate) trait Service<Request> {
    type Response;
    type Error;

    fn call(&mut self, request: Request) -> Result<Self::Response, Self::Error>;
}

#[inline]
#[must_use]
pub(crate) const fn service_fn<F>(f: F) -> ServiceFn<F> {
    ServiceFn { f }
}

#[derive(Clone)]
pub(crate) struct ServiceFn<F> {
    f: F,
}

impl<F, Request, Response, Error> Service<Request> for ServiceFn<F>
where
    F: FnMut(Request) -> Result<Response, Error>,
{
    type Response = Response;
    type Error = Error;

    #[inline]
    fn call(&mut self, request: Request) -> Result<Response, Error> {
        (self.f)(request)
    }
}

/// Boxed service that can be cloned out of a shared registration and called with `&mut self`.
pub(crate) struct BoxCloneService<Request, Response, Error>(
    Box<dyn CloneService<Request, Response = Response, Error = Error> + Send + Sync>,
);

impl<Request, Response, Error> BoxCloneService<Request, Response, Error> {
    #[inline]
    #[must_use]
    pub(crate) fn new<S>(service: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Error> + Clone + Send + Sync + 'static,
    {
        Self(Box::new(service))
    }
}

pub(crate) trait CloneService<Request>: Service<Request> {
    fn clone_box(&self) -> Box<dyn CloneService<Request, Response = Self::Response, Error = Self::Error> + Send + Sync>;
}

impl<Request, S> CloneService<Request> for S
where
    S: Service<Request> + Clone + Send + Sync + 'static,
{
    #[inline]
    fn clone_box(&self) -> Box<dyn CloneService<Request, Response = S::Response, Error = S::Error> + Send + Sync> {
        Box::new(self.clone())
    }
}

impl<Request, Response, Error> Clone for BoxCloneService<Request, Response, Error> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone_box())
    }
}

impl<Request, Response, Error> Service<Request> for BoxCloneService<Request, Response, Error> {
    type Response = Response;
    type Error = Error;

    #[inline]
    fn call(&mut self, request: Request) -> Result<Response, Error> {
        self.0.call(request)
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::{service_fn, BoxCloneService, Service as _};

    #[test]
    fn test_service_fn() {
        let mut service = service_fn(|val: u8| Ok::<_, Infallible>(u16::from(val) * 2));

        assert_eq!(service.call(4).unwrap(), 8);
    }

    #[test]
    fn test_box_clone_service_keeps_state_per_clone() {
        let mut calls = 0u8;
        let mut service = BoxCloneService::new(service_fn(move |()| {
            calls += 1;
            Ok::<_, Infallible>(calls)
        }));

        assert_eq!(service.call(()).unwrap(), 1);

        let mut cloned = service.clone();
        assert_eq!(cloned.call(()).unwrap(), 2);
        assert_eq!(service.call(()).unwrap(), 2);
    }
}
