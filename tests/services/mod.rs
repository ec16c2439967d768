mod continuous;
